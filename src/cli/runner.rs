//! CLI runner - executes commands

use crate::cli::commands::{CheckpointAction, Cli, Commands, OutputFormat, TimeDimAction};
use crate::config::{load_config, validate_config, PipelineConfig};
use crate::engine::EtlPipeline;
use crate::error::{Error, Result};
use crate::time_dim::{generate_calendar, merge, TimeDimension};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run { run_timestamp } => self.run_pipeline(run_timestamp.as_deref()).await,
            Commands::Checkpoint { action } => match action {
                CheckpointAction::Show => self.checkpoint_show().await,
                CheckpointAction::Reset { source } => self.checkpoint_reset(source).await,
            },
            Commands::TimeDim { action } => match action {
                TimeDimAction::Generate { force } => self.time_dim_generate(*force).await,
            },
            Commands::Validate => self.validate(),
            Commands::Sources => self.sources(),
        }
    }

    /// Build the pipeline configuration from the config file and overrides
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.cli.config {
            Some(path) => load_config(path)?,
            None => {
                let raw = self
                    .cli
                    .raw_bucket
                    .clone()
                    .ok_or_else(|| Error::missing_field("raw_bucket (--raw-bucket or RAW_BUCKET)"))?;
                let processed = self.cli.proc_bucket.clone().ok_or_else(|| {
                    Error::missing_field("processed_bucket (--proc-bucket or PROC_BUCKET)")
                })?;
                PipelineConfig::new(raw, processed)
            }
        };

        if let Some(raw) = &self.cli.raw_bucket {
            config.raw_bucket.clone_from(raw);
        }
        if let Some(processed) = &self.cli.proc_bucket {
            config.processed_bucket.clone_from(processed);
        }
        if let Some(key) = &self.cli.checkpoint_key {
            config.checkpoint_key.clone_from(key);
        }
        if let Some(key) = &self.cli.time_dim_key {
            config.time_dim_key.clone_from(key);
        }

        validate_config(&config)?;
        Ok(config)
    }

    fn pipeline(&self) -> Result<EtlPipeline> {
        EtlPipeline::from_config(self.resolve_config()?)
    }

    async fn run_pipeline(&self, run_timestamp: Option<&str>) -> Result<()> {
        let run_ts = match run_timestamp {
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map_err(|e| Error::invalid_value("run_timestamp", e.to_string()))?
                .with_timezone(&Utc),
            None => Utc::now(),
        };

        let pipeline = self.pipeline()?;
        let summary = pipeline.run(run_ts).await?;
        self.output(&summary);
        Ok(())
    }

    async fn checkpoint_show(&self) -> Result<()> {
        let pipeline = self.pipeline()?;
        let checkpoint = pipeline.checkpoints().load().await?;
        self.output(&json!({
            "key": pipeline.checkpoints().key(),
            "watermarks": checkpoint,
        }));
        Ok(())
    }

    async fn checkpoint_reset(&self, sources: &[String]) -> Result<()> {
        let pipeline = self.pipeline()?;
        for source in sources {
            if pipeline.config().source(source).is_none() {
                return Err(Error::invalid_value("source", format!("Unknown source '{source}'")));
            }
        }

        let checkpoint = pipeline.checkpoints().reset(sources).await?;
        info!(reset = ?sources, "Checkpoint reset");
        self.output(&json!({
            "key": pipeline.checkpoints().key(),
            "watermarks": checkpoint,
        }));
        Ok(())
    }

    async fn time_dim_generate(&self, force: bool) -> Result<()> {
        let pipeline = self.pipeline()?;
        let resolver = pipeline.time_dimension();

        let dim = if force {
            let existing = match resolver.load().await {
                Ok(dim) => dim,
                Err(e) if e.is_not_found() => TimeDimension::new(),
                Err(e) => return Err(e),
            };
            let td = &pipeline.config().time_dimension;
            let merged = merge(existing, generate_calendar(td.start, td.end).entries().to_vec());
            resolver.commit(&merged).await?;
            merged
        } else {
            resolver.load_or_generate().await?
        };

        self.output(&json!({
            "key": resolver.key(),
            "entries": dim.len(),
            "first_time_id": dim.entries().first().map(|e| e.time_id),
            "last_time_id": dim.entries().last().map(|e| e.time_id),
        }));
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let config = self.resolve_config()?;
        self.output(&json!({
            "valid": true,
            "raw_bucket": config.raw_bucket,
            "processed_bucket": config.processed_bucket,
            "sources": config.sources.len(),
        }));
        Ok(())
    }

    fn sources(&self) -> Result<()> {
        let config = self.resolve_config()?;
        let sources: Vec<_> = config
            .sources
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "raw_prefix": s.raw_prefix,
                    "output_prefix": s.output_prefix(),
                    "time_dim": s.contributes_time_dim(),
                })
            })
            .collect();
        self.output(&sources);
        Ok(())
    }

    fn output<T: Serialize>(&self, value: &T) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(value).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

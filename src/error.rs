//! Error types for the EcoFarm ETL
//!
//! This module defines the error hierarchy for the entire pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Failed to persist '{key}': {message}")]
    Persistence { key: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    // ============================================================================
    // Upstream Job Errors
    // ============================================================================
    #[error("Job '{job}' did not finish within {timeout_ms}ms")]
    UpstreamTimeout { job: String, timeout_ms: u64 },

    #[error("Calendar job failed: {message}")]
    CalendarJob { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an I/O error for a local path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a persistence error
    pub fn persistence(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a malformed input error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    /// Create a calendar job error
    pub fn calendar_job(message: impl Into<String>) -> Self {
        Self::CalendarJob {
            message: message.into(),
        }
    }

    /// Whether this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this error only affects the logical source it was raised for.
    ///
    /// Everything else aborts the whole run before any checkpoint commit.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            Error::Persistence { .. }
                | Error::Storage { .. }
                | Error::MalformedInput { .. }
                | Error::NotFound { .. }
        )
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Error::NotFound { key: path },
            other => Error::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("raw_bucket");
        assert_eq!(err.to_string(), "Missing required config field: raw_bucket");

        let err = Error::UpstreamTimeout {
            job: "generate-time-dim".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "Job 'generate-time-dim' did not finish within 500ms"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("checkpoints/etl.json").is_not_found());
        assert!(!Error::storage("connection reset").is_not_found());
        assert!(!Error::persistence("k", "denied").is_not_found());
    }

    #[test]
    fn test_object_store_not_found_maps() {
        let err: Error = object_store::Error::NotFound {
            path: "a/b.json".to_string(),
            source: "missing".into(),
        }
        .into();
        assert!(err.is_not_found());

        let err: Error = object_store::Error::NotImplemented.into();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[test]
    fn test_source_local_classification() {
        assert!(Error::persistence("out/x.json", "denied").is_source_local());
        assert!(Error::malformed("bad").is_source_local());
        assert!(Error::storage("throttled").is_source_local());

        assert!(!Error::UpstreamTimeout {
            job: "j".to_string(),
            timeout_ms: 1
        }
        .is_source_local());
        assert!(!Error::checkpoint("corrupt").is_source_local());
    }

    #[test]
    fn test_io_error_names_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::io("/etc/etl.yaml", source);
        assert_eq!(err.to_string(), "IO error on '/etc/etl.yaml': no such file");
        assert!(!err.is_source_local());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}

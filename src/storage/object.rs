//! Cloud storage support (S3, R2, GCS, Azure, local, memory)

use super::types::Storage;
use crate::error::{Error, Result};
use crate::types::ObjectInfo;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use url::Url;

/// Open a bucket URL as a shared storage handle
pub fn open_storage(url: &str) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(ObjectStoreStorage::parse(url)?))
}

/// Bucket backed by an `object_store` implementation
#[derive(Debug, Clone)]
pub struct ObjectStoreStorage {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Base path prefix within the bucket/container
    prefix: String,
    /// Original URL scheme for logging
    scheme: String,
    /// Bucket or container name for logging
    bucket: String,
}

impl ObjectStoreStorage {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>, scheme: impl Into<String>) -> Self {
        Self {
            store,
            prefix: String::new(),
            scheme: scheme.into(),
            bucket: String::new(),
        }
    }

    /// In-process store (contents are lost on drop)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    /// Parse a bucket URL and create the appropriate object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `memory://name` - In-process store
    /// - `file:///local/path/`, `/local/path/` or `./path/` - Local filesystem
    pub fn parse(location: &str) -> Result<Self> {
        let Ok(url) = Url::parse(location) else {
            return Self::parse_local(location);
        };

        match url.scheme() {
            "s3" => Self::parse_s3(&url, false),
            "r2" => Self::parse_s3(&url, true),
            "gs" => Self::parse_gcs(&url),
            "az" => Self::parse_azure(&url),
            "memory" => Ok(Self {
                bucket: url.host_str().unwrap_or_default().to_string(),
                ..Self::in_memory()
            }),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| Error::config(format!("Invalid file URL: {location}")))?;
                Self::parse_local(&path.to_string_lossy())
            }
            // Windows drive letters parse as a one-letter scheme
            scheme if scheme.len() == 1 => Self::parse_local(location),
            scheme => Err(Error::config(format!(
                "Unsupported storage scheme '{scheme}' in {location}"
            ))),
        }
    }

    /// Split a URL into bucket name and key prefix
    fn bucket_and_prefix(url: &Url) -> Result<(String, String)> {
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("Missing bucket name in {url}")))?;
        let prefix = url.path().trim_matches('/').to_string();
        Ok((bucket.to_string(), prefix))
    }

    /// Parse S3 or R2 URL
    fn parse_s3(url: &Url, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = Self::bucket_and_prefix(url)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);

        // AWS_ENDPOINT is read by from_env(); R2 may also come from its own variable
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: scheme.to_string(),
            bucket,
        })
    }

    /// Parse GCS URL
    fn parse_gcs(url: &Url) -> Result<Self> {
        let (bucket, prefix) = Self::bucket_and_prefix(url)?;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "gs".to_string(),
            bucket,
        })
    }

    /// Parse Azure Blob URL
    fn parse_azure(url: &Url) -> Result<Self> {
        let (container, prefix) = Self::bucket_and_prefix(url)?;

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(&container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "az".to_string(),
            bucket: container,
        })
    }

    /// Parse local filesystem path
    fn parse_local(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            scheme: "file".to_string(),
            bucket: path.to_string(),
        })
    }

    /// Get the scheme (s3, r2, gs, az, file, memory)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Check if this is a cloud bucket (not local or in-process)
    pub fn is_cloud(&self) -> bool {
        !matches!(self.scheme.as_str(), "file" | "memory")
    }

    /// Full object path for a key
    fn path(&self, key: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{key}", self.prefix))
        }
    }

    /// Key relative to the bucket prefix, in the same raw form `path`
    /// accepts.
    ///
    /// `ObjectPath` percent-encodes characters such as `#`, `%` or `{` in
    /// each segment, so the segments are decoded before joining.
    fn relative_key(&self, location: &ObjectPath) -> String {
        let full = location
            .parts()
            .map(|part| {
                let encoded = part.as_ref();
                urlencoding::decode(encoded)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| encoded.to_string())
            })
            .collect::<Vec<_>>()
            .join("/");
        if self.prefix.is_empty() {
            return full;
        }
        full.strip_prefix(&self.prefix)
            .map(|k| k.trim_start_matches('/').to_string())
            .unwrap_or(full)
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<ObjectInfo>> {
        let path = self.path(prefix);
        self.store
            .list(Some(&path))
            .map(move |meta| -> Result<ObjectInfo> {
                let meta = meta?;
                Ok(ObjectInfo::new(
                    self.relative_key(&meta.location),
                    meta.last_modified,
                ))
            })
            .boxed()
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let result = self.store.get(&self.path(key)).await?;
        Ok(result.bytes().await?)
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.store
            .put(&self.path(key), data.into())
            .await
            .map_err(|e| Error::persistence(key, e.to_string()))?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool> {
        match self.store.head(&self.path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        if self.prefix.is_empty() {
            format!("{}://{}", self.scheme, self.bucket)
        } else {
            format!("{}://{}/{}", self.scheme, self.bucket, self.prefix)
        }
    }
}

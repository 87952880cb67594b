//! Storage trait

use crate::error::Result;
use crate::types::ObjectInfo;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Minimal object storage interface used by the pipeline
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// List every object under a prefix.
    ///
    /// Pagination is handled inside the stream; the stream is finite.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<ObjectInfo>>;

    /// Read an object. Missing keys yield `Error::NotFound`.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Write a whole object in a single put. Failures yield `Error::Persistence`.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Whether an object exists
    async fn head(&self, key: &str) -> Result<bool>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

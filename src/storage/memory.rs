//! In-process storage with controllable modification times

use super::types::Storage;
use crate::error::{Error, Result};
use crate::types::ObjectInfo;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// Storage held in memory.
///
/// Listing is paged the way S3 pages `ListObjectsV2`: each page re-reads the
/// map starting after the last key of the previous page.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    name: String,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    page_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the listing page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Write an object with an explicit modification time
    pub async fn put_at(&self, key: &str, data: impl Into<Bytes>, last_modified: DateTime<Utc>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
            },
        );
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All keys under a prefix, in key order
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// One listing page: keys under `prefix` strictly after `start_after`
    async fn page(&self, prefix: &str, start_after: &str) -> Vec<ObjectInfo> {
        let objects = self.objects.read().await;
        objects
            .iter()
            .filter(|(k, _)| k.as_str() > start_after && k.starts_with(prefix))
            .take(self.page_size)
            .map(|(k, o)| ObjectInfo::new(k.clone(), o.last_modified))
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<ObjectInfo>> {
        stream::unfold(Some(String::new()), move |cursor| async move {
            let start_after = cursor?;
            let page = self.page(prefix, &start_after).await;
            if page.is_empty() {
                return None;
            }
            let next = if page.len() < self.page_size {
                None
            } else {
                page.last().map(|o| o.key.clone())
            };
            Some((stream::iter(page.into_iter().map(Ok)), next))
        })
        .flatten()
        .boxed()
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::not_found(key))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.put_at(key, data, Utc::now()).await;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }
}

//! Content-addressed blob store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use xintent_core::identity::content_id;
use xintent_core::{ContentId, Result, XIntentError};

/// Opaque blob storage keyed by the hash of the blob.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their content id.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId>;

    async fn get(&self, id: &ContentId) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, id: &ContentId) -> Result<bool>;
}

/// In-memory store. Can be switched offline to exercise unreachable-store
/// paths.
#[derive(Clone)]
pub struct InMemoryContentStore {
    blobs: Arc<RwLock<HashMap<ContentId, Vec<u8>>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(XIntentError::ContentStore("store unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId> {
        self.ensure_available()?;
        let id = content_id(&bytes);
        self.blobs.write().await.insert(id, bytes);
        debug!(content_id = %id, "blob stored");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<Option<Vec<u8>>> {
        self.ensure_available()?;
        Ok(self.blobs.read().await.get(id).cloned())
    }

    async fn exists(&self, id: &ContentId) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.blobs.read().await.contains_key(id))
    }
}

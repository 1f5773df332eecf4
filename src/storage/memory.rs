use dashmap::DashMap;

use crate::error::AppError;
use crate::storage::BlobStore;

/// Process-local blob store. Used for tests and `STORAGE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.blobs.remove(key);
        Ok(())
    }
}

//! Key-value blob storage backing the store and the cart.
//!
//! Every collection lives under its own key as a JSON list. Writes are
//! synchronous and replace the whole blob.

mod file;
mod memory;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use crate::error::AppError;

pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Businesses,
    Products,
    Orders,
    DeliveryPersons,
    Clients,
    Cart,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Businesses => "businesses",
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::DeliveryPersons => "deliveryPersons",
            Collection::Clients => "clients",
            Collection::Cart => "cart",
        }
    }

    pub fn key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }
}

/// Typed view over a [`BlobStore`] that namespaces keys with a prefix.
#[derive(Clone)]
pub struct Blobs {
    prefix: String,
    store: Arc<dyn BlobStore>,
}

impl Blobs {
    pub fn new(store: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    /// Returns `None` when the key has never been written.
    pub fn load<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Option<Vec<T>>, AppError> {
        match self.store.get(&collection.key(&self.prefix))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), AppError> {
        let raw = serde_json::to_string(items)?;
        self.store.set(&collection.key(&self.prefix), &raw)
    }

    /// Removes the collection's key entirely.
    pub fn clear(&self, collection: Collection) -> Result<(), AppError> {
        self.store.remove(&collection.key(&self.prefix))
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::cart::Cart;
use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::storage::{BlobStore, Blobs, FileBlobStore, MemoryBlobStore};
use crate::store::{self, Store, StoreEvent, StoreHandle, StoreWorker};

pub struct AppState {
    pub store: StoreHandle,
    pub cart: Cart,
    pub events: broadcast::Sender<StoreEvent>,
    pub metrics: Metrics,
    pub courier_tick: Duration,
}

impl AppState {
    /// Loads the store from `blob_store` and returns the worker that must be
    /// spawned for the handle to answer.
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        config: &Config,
    ) -> Result<(Self, StoreWorker), AppError> {
        let metrics = Metrics::new();
        let (events, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let blobs = Blobs::new(blob_store, config.storage_prefix.clone());

        let store = Store::load(
            blobs.clone(),
            config.seed_demo_data,
            metrics.clone(),
            events.clone(),
        )?;
        let (handle, worker) = store::handle::channel(store, config.store_queue_size);

        Ok((
            Self {
                store: handle,
                cart: Cart::open(blobs)?,
                events,
                metrics,
                courier_tick: config.courier_tick,
            },
            worker,
        ))
    }

    pub fn blob_store(config: &Config) -> Result<Arc<dyn BlobStore>, AppError> {
        let store: Arc<dyn BlobStore> = match config.storage_backend {
            StorageBackend::File => Arc::new(FileBlobStore::open(config.data_dir.clone())?),
            StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
        };
        Ok(store)
    }
}

//! Storage selection and service wiring.

use std::sync::Arc;

use stockroom_infra::{
    Directory, InMemoryInventoryStore, PostgresInventoryStore, SharedStore, StockLedger,
    StoreError,
};

/// Services shared by every handler, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub directory: Directory,
    pub ledger: StockLedger,
    store: SharedStore,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            directory: Directory::new(store.clone()),
            ledger: StockLedger::new(store.clone()),
            store,
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()))
    }

    /// Tear down the storage handle once the server has stopped.
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}

/// Connect to Postgres when a URL is configured, otherwise fall back to the
/// in-memory store.
pub async fn build_services(database_url: Option<&str>) -> Result<AppServices, StoreError> {
    match database_url {
        Some(url) => {
            let store = PostgresInventoryStore::connect(url).await?;
            Ok(AppServices::new(Arc::new(store)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
            Ok(AppServices::in_memory())
        }
    }
}

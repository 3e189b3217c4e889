use std::sync::Arc;

use mongodb::bson::doc;
use mongodb::Client as MongoClient;

use crate::config::Config;
use crate::store::{GameStore, MongoStore};

use locks::KeyedLocks;

pub mod answer_service;
pub mod completion_service;
pub mod locks;
pub mod question_service;
pub mod rewards;
pub mod session_service;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn GameStore>,
    pub session_locks: Arc<KeyedLocks>,
    pub user_locks: Arc<KeyedLocks>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        tracing::info!("Checking MongoDB connectivity...");

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            mongo_client
                .database(&config.mongo_database)
                .run_command(doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;

        tracing::info!("MongoDB connection established");

        let store = Arc::new(MongoStore::new(mongo_client, &config.mongo_database));
        Ok(Self::with_store(config, store))
    }

    /// Wires the state over any store implementation; tests pass an
    /// in-memory one.
    pub fn with_store(config: Config, store: Arc<dyn GameStore>) -> Self {
        Self {
            config,
            store,
            session_locks: Arc::new(KeyedLocks::new()),
            user_locks: Arc::new(KeyedLocks::new()),
        }
    }
}

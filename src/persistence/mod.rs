pub mod file;
pub mod redis_store;

pub use file::FileStateStore;
pub use redis_store::RedisStateStore;

use crate::error::StateError;
use crate::models::StateMap;

/// Durable per-asset state, read once at cycle start and written once at the end
pub enum StateStore {
    File(FileStateStore),
    Redis(RedisStateStore),
}

impl StateStore {
    pub async fn load(&mut self) -> Result<StateMap, StateError> {
        match self {
            StateStore::File(store) => store.load().await,
            StateStore::Redis(store) => store.load().await,
        }
    }

    pub async fn save(&mut self, states: &StateMap) -> Result<(), StateError> {
        match self {
            StateStore::File(store) => store.save(states).await,
            StateStore::Redis(store) => store.save(states).await,
        }
    }

    /// Load state, falling back to an empty map when it is corrupt.
    ///
    /// A bad state record must not block every future alert, so corruption
    /// is logged and the cycle starts from scratch. Other errors propagate.
    pub async fn load_or_reset(&mut self) -> Result<StateMap, StateError> {
        match self.load().await {
            Ok(states) => Ok(states),
            Err(StateError::StateCorrupt(reason)) => {
                tracing::warn!("⚠️  Persisted state is corrupt ({}), reinitializing empty", reason);
                Ok(StateMap::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StateStore::File(store) => format!("file {}", store.path().display()),
            StateStore::Redis(_) => "redis".to_string(),
        }
    }
}

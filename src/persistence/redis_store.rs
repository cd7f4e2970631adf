use crate::error::StateError;
use crate::models::StateMap;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

const CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_STATE_KEY: &str = "signalbot:state";

/// Redis persistence for per-asset state
///
/// The whole map lives under one key as a JSON string, so a cycle's write is
/// a single SET.
pub struct RedisStateStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisStateStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `key` - Key holding the serialized state map
    pub async fn new(redis_url: &str, key: &str) -> Result<Self, StateError> {
        let client = Client::open(redis_url)?;

        let conn = timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| StateError::Timeout(CONNECT_TIMEOUT_SECS))??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }

    pub async fn load(&mut self) -> Result<StateMap, StateError> {
        let raw: Option<String> = self.conn.get(&self.key).await?;

        match raw {
            None => Ok(StateMap::new()),
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                StateError::StateCorrupt(format!("redis key {}: {}", self.key, e))
            }),
        }
    }

    pub async fn save(&mut self, states: &StateMap) -> Result<(), StateError> {
        let json =
            serde_json::to_string(states).map_err(|e| StateError::StateCorrupt(e.to_string()))?;

        self.conn.set::<_, _, ()>(&self.key, json).await?;

        tracing::debug!("Saved {} asset states to Redis key {}", states.len(), self.key);

        Ok(())
    }
}

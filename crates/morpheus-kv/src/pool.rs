//! The connection pool, grounded on `mod-redis::ClientManager` in the
//! teacher workspace: a `deadpool::managed::Manager` around a plain
//! `redis::Client`, recycled with a `PING`. Lua/config-module plumbing from
//! the teacher is dropped; Morpheus configures Redis from its own config
//! struct, not from embedded Lua.

use deadpool::managed::{Manager, Metrics, Pool, RecycleError, RecycleResult};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

pub struct ClientManager {
    client: redis::Client,
}

impl ClientManager {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(Self { client: redis::Client::open(url)? })
    }
}

impl Manager for ClientManager {
    type Type = ConnectionManager;
    type Error = redis::RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.client
            .get_connection_manager_with_config(ConnectionManagerConfig::new())
            .await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<redis::RedisError> {
        redis::cmd("PING")
            .query_async::<String>(conn)
            .await
            .map(|_| ())
            .map_err(RecycleError::Backend)
    }
}

pub type KvPool = Pool<ClientManager>;

/// Builds a pool against `redis_url`, sized for the worker pool's
/// concurrency (spec.md §5 default 20 concurrent job executors).
pub fn build_pool(redis_url: &str) -> anyhow::Result<KvPool> {
    let manager = ClientManager::new(redis_url)?;
    Ok(Pool::builder(manager).max_size(32).build()?)
}

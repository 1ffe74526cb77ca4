//! Task persistence behind a small seam: the HTTP layer saves and loads
//! tasks; the on-the-wire format of external stores is their own concern.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::debug;

use a2a_types::Task;

use crate::errors::GatewayResult;

/// Contract the gateway depends on. Implementations must serialize
/// per-task mutations; callers assume linearizable single-key read/write.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save(&self, task: &Task) -> GatewayResult<()>;
    async fn load(&self, task_id: &str) -> GatewayResult<Option<Task>>;
}

/// In-memory store for development and tests. Tasks accumulate until
/// `clear` is called.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.tasks.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task) -> GatewayResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load(&self, task_id: &str) -> GatewayResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }
}

/// Redis-backed store: each task is JSON under `{prefix}{task_id}` with a
/// TTL, so finished tasks age out on their own.
pub struct RedisTaskStore {
    conn: redis::aio::ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl RedisTaskStore {
    /// Connects eagerly; a bad URL or unreachable server fails startup.
    pub async fn connect(url: &str, prefix: &str, ttl_secs: u64) -> GatewayResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        debug!(prefix = %prefix, ttl_secs, "connected redis task store");
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            ttl_secs,
        })
    }

    fn key(&self, task_id: &str) -> String {
        format!("{}{task_id}", self.prefix)
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn save(&self, task: &Task) -> GatewayResult<()> {
        let payload = serde_json::to_string(task)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.key(&task.id), payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn load(&self, task_id: &str) -> GatewayResult<Option<Task>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(self.key(task_id)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

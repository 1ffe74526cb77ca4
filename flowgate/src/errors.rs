/// Error types for the gateway engine.
use std::io;

/// Failures raised while talking to an upstream flow endpoint.
///
/// Each variant corresponds to one user-visible failure kind; the executor
/// translates all of them into a terminal `failed` status (socket agents) or
/// a generic error message (REST agents) without leaking details.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("upstream request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },

    #[error("network error while calling upstream: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream session disconnected before completion")]
    Disconnect,

    #[error("upstream socket error: {reason}")]
    SocketError { reason: String },

    #[error("upstream session exceeded {timeout_ms}ms")]
    SessionTimeout { timeout_ms: u64 },

    #[error("failed to connect to upstream: {reason}")]
    ConnectFailed { reason: String },
}

/// Failures of the connection pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("connection for agent '{agent_id}' is dead")]
    Dead { agent_id: String },

    #[error("upstream rejected authentication for agent '{agent_id}': {reason}")]
    Auth { agent_id: String, reason: String },

    #[error(transparent)]
    Connect(#[from] AdapterError),
}

/// Main error type for the gateway engine.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("malformed upstream output: {reason}")]
    MalformedOutput { reason: String },

    #[error("task store error: {reason}")]
    TaskStore { reason: String },

    #[error("serialization error: {format}: {reason}")]
    Serialization { format: String, reason: String },

    #[error("internal error: {component}: {reason}")]
    Internal { component: String, reason: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Convenience type alias.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            format: "json".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<io::Error> for GatewayError {
    fn from(error: io::Error) -> Self {
        Self::Internal {
            component: "io".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(error: redis::RedisError) -> Self {
        Self::TaskStore {
            reason: error.to_string(),
        }
    }
}

/// Errors raised while loading or validating the gateway configuration.
///
/// All of these are fatal at startup and never occur at request time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable '{name}' referenced by config is missing or empty")]
    MissingEnv { name: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

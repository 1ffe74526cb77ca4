use std::path::PathBuf;

use crate::errors::ConfigError;

/// Task-store selection, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStoreSettings {
    Memory,
    Redis {
        url: String,
        ttl_secs: u64,
        prefix: String,
    },
}

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_level: String,
    pub log_pretty: bool,
    pub environment: String,
    pub config_path: PathBuf,
    /// Public base URL advertised in discovery cards.
    pub base_url: String,
    pub task_store: TaskStoreSettings,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE")
    )
}

impl Settings {
    /// Reads all recognized environment keys, applying defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env_or("PORT", "3000")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                reason: "PORT is not a valid port number".into(),
            })?;

        let task_store = match env_or("TASK_STORE", "memory").as_str() {
            "memory" => TaskStoreSettings::Memory,
            "redis" => {
                let url = std::env::var("TASK_STORE_URL")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .ok_or(ConfigError::MissingEnv {
                        name: "TASK_STORE_URL".into(),
                    })?;
                let ttl_secs = env_or("TASK_STORE_TTL_SECS", "3600").parse().map_err(|_| {
                    ConfigError::Invalid {
                        reason: "TASK_STORE_TTL_SECS is not a valid number of seconds".into(),
                    }
                })?;
                TaskStoreSettings::Redis {
                    url,
                    ttl_secs,
                    prefix: env_or("TASK_STORE_PREFIX", "flowgate:task:"),
                }
            }
            other => {
                return Err(ConfigError::Invalid {
                    reason: format!("unknown TASK_STORE kind '{other}' (expected memory or redis)"),
                })
            }
        };

        Ok(Self {
            port,
            log_level: env_or("LOG_LEVEL", "info"),
            log_pretty: env_flag("LOG_PRETTY"),
            environment: env_or("ENVIRONMENT", "development"),
            config_path: PathBuf::from(env_or("CONFIG_PATH", "agents.json")),
            base_url: env_or("BASE_URL", &format!("http://localhost:{port}")),
            task_store,
        })
    }
}

//! Gateway configuration: the agents document, environment settings, and
//! `${VAR}` placeholder resolution.
//!
//! Configuration errors are fatal at startup and never surface at request
//! time; the loader validates everything it hands to the registry.

mod loader;
mod settings;
mod types;

pub use loader::{load_config, parse_config, GatewayConfig};
pub use settings::{Settings, TaskStoreSettings};
pub use types::{AgentDescriptor, SkillDescriptor, TransportKind};

//! HTTP surface for the flowgate gateway: discovery endpoints, health
//! probe, and the per-agent A2A JSON-RPC entry point, served with axum.

pub mod error;
pub mod json_rpc;
pub mod routes;
pub mod server;

pub use error::{Error, Result};
pub use routes::{create_routes, AppState};
pub use server::GatewayServer;

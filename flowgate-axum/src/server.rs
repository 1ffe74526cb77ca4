use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use flowgate::adapters::{RestAdapter, SocketAdapter, WsConnector};
use flowgate::{
    AgentRegistry, FlowAdapter, FlowConnectionPool, FlowExecutor, GatewayResult, PoolConfig,
    TaskSessionRegistry, TaskStore, TransportKind,
};

use crate::routes::{create_routes, AppState};

/// A2A server for the gateway: wires one executor per configured agent and
/// serves the discovery and JSON-RPC surface.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    /// Builds the full production wiring: shared session registry, one
    /// connection pool for every socket agent, and one adapter + executor
    /// per descriptor.
    pub fn new(registry: Arc<AgentRegistry>, store: Arc<dyn TaskStore>) -> GatewayResult<Self> {
        let sessions = Arc::new(TaskSessionRegistry::new());
        let pool = FlowConnectionPool::new(Arc::new(WsConnector), PoolConfig::default());

        let mut executors = HashMap::new();
        for descriptor in registry.descriptors() {
            let adapter: Arc<dyn FlowAdapter> = match descriptor.transport {
                TransportKind::Rest => Arc::new(RestAdapter::new(descriptor)?),
                TransportKind::Socket => {
                    Arc::new(SocketAdapter::new(descriptor.clone(), pool.clone()))
                }
            };
            executors.insert(
                descriptor.id.clone(),
                Arc::new(FlowExecutor::new(adapter, sessions.clone())),
            );
        }

        Ok(Self {
            state: AppState {
                registry,
                store,
                executors: Arc::new(executors),
            },
        })
    }

    /// Builds a server around externally constructed state. Useful for
    /// tests that substitute adapters.
    #[must_use]
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Converts the server into an axum router.
    #[must_use]
    pub fn into_router(self) -> Router {
        create_routes(self.state).layer(CorsLayer::permissive())
    }

    /// Binds and serves until the process ends.
    pub async fn serve(self, addr: impl tokio::net::ToSocketAddrs) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!("A2A gateway listening at http://{local_addr}");
        info!(
            "Discovery document: http://{local_addr}/.well-known/agents.json ({} agents)",
            self.state.registry.len()
        );
        for card in self.state.registry.cards() {
            info!(
                "  agent '{}' (streaming: {}) -> {}",
                card.name, card.capabilities.streaming, card.url
            );
        }

        let app = self.into_router();
        axum::serve(listener, app).await
    }
}

//! # flowgate
//!
//! Protocol-translation engine that exposes Cognigy flows as first-class
//! agents speaking the open Agent-to-Agent (A2A) JSON-RPC protocol, v0.3.0.
//!
//! The pipeline for one invocation:
//!
//! ```text
//! RequestContext ─► FlowExecutor ─► FlowAdapter (rest | socket) ─► upstream
//!                        │                                            │
//!                        ◄──── normalizer ◄── raw backend outputs ◄───┘
//!                        │
//!                        ▼
//!                    EventBus (status updates, artifacts, messages)
//! ```
//!
//! The HTTP surface lives in the `flowgate-axum` crate; this crate is
//! transport-agnostic apart from the upstream adapters themselves.

pub mod adapters;
pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod normalizer;
pub mod pool;
pub mod registry;
pub mod sessions;
pub mod task_store;

pub use adapters::{FlowAdapter, FlowRequest, RawFlowOutput, RestAdapter, SocketAdapter};
pub use config::{AgentDescriptor, GatewayConfig, Settings, TransportKind};
pub use errors::{AdapterError, ConfigError, GatewayError, GatewayResult, PoolError};
pub use events::{EventBus, QueueEventBus, TaskEvent};
pub use executor::{FlowExecutor, RequestContext};
pub use pool::{ConnectionState, EndpointConnector, FlowConnectionPool, PoolConfig};
pub use registry::AgentRegistry;
pub use sessions::{CancelSignal, TaskSessionRegistry};
pub use task_store::{InMemoryTaskStore, RedisTaskStore, TaskStore};

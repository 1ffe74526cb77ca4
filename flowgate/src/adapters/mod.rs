//! Upstream adapters: the two interchangeable transport strategies that turn
//! one user turn into a sequence of raw backend outputs.

mod envelope;
mod rest;
mod socket;

pub use envelope::{expand_output, is_internal_metadata};
pub use rest::RestAdapter;
pub use socket::{SocketAdapter, WsConnector};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::TransportKind;
use crate::errors::{AdapterError, GatewayResult};

/// One record emitted by the upstream backend within a single logical turn.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawFlowOutput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RawFlowOutput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            data: None,
        }
    }

    #[must_use]
    pub fn from_data(data: Value) -> Self {
        Self {
            text: None,
            data: Some(data),
        }
    }

    /// The output text, trimmed, when it is non-empty.
    #[must_use]
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// One upstream invocation: the user turn plus routing identifiers.
#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub text: String,
    pub session_id: String,
    pub user_id: String,
    pub data: Option<Value>,
}

/// Callback invoked synchronously for each raw output as it arrives on the
/// streaming path. A callback error is logged by the adapter and never
/// aborts the session.
pub type OutputCallback<'a> = Box<dyn FnMut(RawFlowOutput, usize) -> GatewayResult<()> + Send + 'a>;

/// A transport strategy bound to one upstream endpoint.
///
/// `send` resolves with the complete ordered output list. Adapters for the
/// streaming transport additionally invoke `on_output` for each output as it
/// arrives, before the session terminates; the REST adapter ignores it.
#[async_trait]
pub trait FlowAdapter: Send + Sync {
    fn transport(&self) -> TransportKind;

    async fn send(
        &self,
        request: FlowRequest,
        on_output: Option<OutputCallback<'_>>,
    ) -> Result<Vec<RawFlowOutput>, AdapterError>;
}

//! One-shot request/response transport: a single timeout-guarded HTTP POST
//! to the upstream REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::envelope;
use super::{FlowAdapter, FlowRequest, OutputCallback, RawFlowOutput};
use crate::config::{AgentDescriptor, TransportKind};
use crate::errors::{AdapterError, GatewayError, GatewayResult};

/// Inclusive of connect and response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Wire shape of the upstream response body.
#[derive(Debug, Deserialize)]
struct RestEnvelope {
    #[serde(default, rename = "outputStack")]
    output_stack: Vec<RawFlowOutput>,
}

/// Synchronous request/response adapter for REST endpoints.
pub struct RestAdapter {
    client: reqwest::Client,
    invoke_url: String,
    agent_id: String,
}

impl RestAdapter {
    pub fn new(descriptor: &AgentDescriptor) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Internal {
                component: "rest_adapter".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            invoke_url: descriptor.invoke_url(),
            agent_id: descriptor.id.clone(),
        })
    }

    fn request_body(request: &FlowRequest) -> Value {
        let mut body = json!({
            "userId": request.user_id,
            "sessionId": request.session_id,
            "text": request.text,
        });
        // The data key is absent when the caller supplied none, not null.
        if let Some(data) = &request.data {
            body["data"] = data.clone();
        }
        body
    }
}

#[async_trait]
impl FlowAdapter for RestAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn send(
        &self,
        request: FlowRequest,
        _on_output: Option<OutputCallback<'_>>,
    ) -> Result<Vec<RawFlowOutput>, AdapterError> {
        debug!(agent = %self.agent_id, session = %request.session_id, "invoking REST endpoint");

        let response = self
            .client
            .post(&self.invoke_url)
            .header(header::ACCEPT, "application/json")
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    AdapterError::Timeout {
                        timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
                    }
                } else {
                    AdapterError::Network { source }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Http {
                status: status.as_u16(),
            });
        }

        let envelope: RestEnvelope = response.json().await.map_err(|source| {
            if source.is_timeout() {
                AdapterError::Timeout {
                    timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
                }
            } else {
                AdapterError::Network { source }
            }
        })?;

        let outputs: Vec<RawFlowOutput> = envelope
            .output_stack
            .into_iter()
            .map(|raw| RawFlowOutput {
                text: raw.text,
                data: envelope::decode_data(raw.data),
            })
            .filter(|raw| !envelope::is_internal_metadata(raw))
            .flat_map(envelope::expand_output)
            .collect();

        debug!(agent = %self.agent_id, outputs = outputs.len(), "REST endpoint returned");
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(data: Option<Value>) -> FlowRequest {
        FlowRequest {
            text: "hi".into(),
            session_id: "ctx-1".into(),
            user_id: "a2a-ctx-1".into(),
            data,
        }
    }

    #[test]
    fn body_omits_data_when_absent() {
        let body = RestAdapter::request_body(&request(None));
        assert_eq!(body["userId"], "a2a-ctx-1");
        assert_eq!(body["sessionId"], "ctx-1");
        assert_eq!(body["text"], "hi");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn body_includes_data_when_supplied() {
        let body = RestAdapter::request_body(&request(Some(json!({ "lang": "en" }))));
        assert_eq!(body["data"], json!({ "lang": "en" }));
    }
}

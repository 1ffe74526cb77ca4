//! Streaming transport: a dedicated websocket session per invocation.
//!
//! Every call connects its own session bound to the caller's user and
//! session ids; sessions are never shared across calls, so one upstream
//! identity cannot leak outputs between conversations. The agent-level
//! liveness connection is managed separately by the pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use super::envelope;
use super::{FlowAdapter, FlowRequest, OutputCallback, RawFlowOutput};
use crate::config::{AgentDescriptor, TransportKind};
use crate::errors::AdapterError;
use crate::pool::{EndpointConnector, FlowConnectionPool, LiveConnection};

/// Hard upper bound for one streaming session, inclusive of connect.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Frames the upstream sends over a session socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerFrame {
    #[serde(rename = "output")]
    Output {
        #[serde(default)]
        data: RawFlowOutput,
    },
    #[serde(rename = "finalPing")]
    FinalPing,
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
}

fn ws_invoke_url(descriptor: &AgentDescriptor) -> Result<String, AdapterError> {
    let mut url =
        url::Url::parse(&descriptor.invoke_url()).map_err(|e| AdapterError::ConnectFailed {
            reason: format!("invalid endpoint URL: {e}"),
        })?;
    let mapped = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        "ws" | "wss" => None,
        other => {
            return Err(AdapterError::ConnectFailed {
                reason: format!("unsupported endpoint scheme '{other}'"),
            })
        }
    };
    if let Some(scheme) = mapped {
        // set_scheme only fails for invalid schemes; ws/wss are valid.
        let _ = url.set_scheme(scheme);
    }
    Ok(url.to_string())
}

/// Streaming adapter for socket endpoints.
pub struct SocketAdapter {
    descriptor: AgentDescriptor,
    pool: Arc<FlowConnectionPool>,
    session_timeout: Duration,
}

impl SocketAdapter {
    #[must_use]
    pub fn new(descriptor: AgentDescriptor, pool: Arc<FlowConnectionPool>) -> Self {
        Self {
            descriptor,
            pool,
            session_timeout: SESSION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    fn input_frame(request: &FlowRequest) -> String {
        let mut frame = json!({
            "type": "input",
            "userId": request.user_id,
            "sessionId": request.session_id,
            "text": request.text,
        });
        if let Some(data) = &request.data {
            frame["data"] = data.clone();
        }
        frame.to_string()
    }

    async fn run_session(
        &self,
        request: FlowRequest,
        mut on_output: Option<OutputCallback<'_>>,
    ) -> Result<Vec<RawFlowOutput>, AdapterError> {
        let deadline = Instant::now() + self.session_timeout;
        let timeout_ms = self.session_timeout.as_millis() as u64;
        let url = ws_invoke_url(&self.descriptor)?;

        let connect = tokio::time::timeout_at(deadline, connect_async(url.as_str()))
            .await
            .map_err(|_| AdapterError::SessionTimeout { timeout_ms })?;
        let (ws, _) = connect.map_err(|e| AdapterError::ConnectFailed {
            reason: e.to_string(),
        })?;
        let (mut sink, mut stream) = ws.split();

        sink.send(Message::Text(Self::input_frame(&request)))
            .await
            .map_err(|e| AdapterError::SocketError {
                reason: e.to_string(),
            })?;

        let mut outputs: Vec<RawFlowOutput> = Vec::new();

        // First settlement wins; every exit path below falls through to the
        // teardown after the loop.
        let outcome = loop {
            let frame = match tokio::time::timeout_at(deadline, stream.next()).await {
                Err(_) => break Err(AdapterError::SessionTimeout { timeout_ms }),
                Ok(None) => break Err(AdapterError::Disconnect),
                Ok(Some(Err(e))) => {
                    break Err(AdapterError::SocketError {
                        reason: e.to_string(),
                    })
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(ServerFrame::Output { data }) => {
                        for entry in envelope::expand_output(data) {
                            let index = outputs.len();
                            outputs.push(entry.clone());
                            if let Some(callback) = on_output.as_mut() {
                                if let Err(err) = callback(entry, index) {
                                    warn!(error = %err, index, "output callback failed");
                                }
                            }
                        }
                    }
                    Ok(ServerFrame::FinalPing) => break Ok(()),
                    Ok(ServerFrame::Disconnect) => break Err(AdapterError::Disconnect),
                    Ok(ServerFrame::Error { message }) => {
                        break Err(AdapterError::SocketError { reason: message })
                    }
                    Err(err) => {
                        warn!(error = %err, "ignoring unrecognized session frame");
                    }
                },
                Message::Close(_) => break Err(AdapterError::Disconnect),
                _ => {}
            }
        };

        let _ = sink.close().await;
        outcome.map(|()| outputs)
    }
}

#[async_trait]
impl FlowAdapter for SocketAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::Socket
    }

    async fn send(
        &self,
        request: FlowRequest,
        on_output: Option<OutputCallback<'_>>,
    ) -> Result<Vec<RawFlowOutput>, AdapterError> {
        self.pool
            .get_or_create(&self.descriptor)
            .await
            .map_err(|err| AdapterError::ConnectFailed {
                reason: err.to_string(),
            })?;

        self.pool.session_started(&self.descriptor.id).await;
        debug!(agent = %self.descriptor.id, session = %request.session_id, "opening streaming session");
        let result = self.run_session(request, on_output).await;
        self.pool.session_ended(&self.descriptor.id).await;
        result
    }
}

/// Production connector for the pool's liveness connections: holds a socket
/// open without sending traffic and reports when the upstream drops it.
pub struct WsConnector;

#[async_trait]
impl EndpointConnector for WsConnector {
    async fn connect(&self, descriptor: &AgentDescriptor) -> Result<LiveConnection, AdapterError> {
        let url = ws_invoke_url(descriptor)?;
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AdapterError::ConnectFailed {
                reason: e.to_string(),
            })?;

        let (closed_tx, closed_rx) = oneshot::channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (mut sink, mut stream) = ws.split();
            let mut closed_tx = Some(closed_tx);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        let _ = sink.close().await;
                        return;
                    }
                    frame = stream.next() => {
                        let reason = match frame {
                            None => "connection closed by upstream".to_string(),
                            Some(Err(e)) => e.to_string(),
                            Some(Ok(Message::Close(close))) => close
                                .map(|c| c.reason.to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "connection closed by upstream".to_string()),
                            // The liveness connection ignores content frames.
                            Some(Ok(_)) => continue,
                        };
                        if let Some(tx) = closed_tx.take() {
                            let _ = tx.send(reason);
                        }
                        return;
                    }
                }
            }
        });

        Ok(LiveConnection {
            closed: closed_rx,
            shutdown: shutdown_tx,
        })
    }
}

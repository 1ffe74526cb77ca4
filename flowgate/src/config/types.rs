use serde::{Deserialize, Serialize};

/// The two upstream transport strategies an agent can be bound to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Synchronous request/response over HTTP.
    Rest,
    /// Persistent bidirectional socket session.
    Socket,
}

/// One capability entry copied verbatim into the agent's discovery card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A resolved agent record. Immutable after startup; every `${VAR}`
/// placeholder has been substituted before this is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Unique, URL-safe identifier.
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub transport: TransportKind,
    /// Base URL of the upstream endpoint.
    pub endpoint_url: String,
    /// Endpoint token, appended to the base URL as a path segment.
    pub endpoint_token: String,
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
}

impl AgentDescriptor {
    /// Full invocation URL: the base URL with at most one trailing slash
    /// removed, then the token appended as a path segment.
    #[must_use]
    pub fn invoke_url(&self) -> String {
        let base = self
            .endpoint_url
            .strip_suffix('/')
            .unwrap_or(&self.endpoint_url);
        format!("{base}/{}", self.endpoint_token)
    }
}

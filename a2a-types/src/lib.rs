//! # A2A (Agent2Agent) Protocol Types
//!
//! Rust data structures for the Agent2Agent (A2A) protocol, release 0.3.0,
//! covering the subset of the JSON Schema a protocol gateway speaks: the
//! JSON-RPC 2.0 envelope, tasks and their lifecycle, messages and parts,
//! artifacts, the streaming event kinds, and the agent card served from the
//! well-known discovery paths. Everything is designed for serialization and
//! deserialization with `serde`; field names follow the schema's camelCase.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod agent_card;
pub use agent_card::{AgentCapabilities, AgentCard, AgentSkill};

// ============================================================================
// JSON-RPC 2.0 Base Types (from schema)
// ============================================================================

/// Represents a JSON-RPC 2.0 identifier, which can be a string, number, or null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JSONRPCId {
    String(String),
    Integer(i64),
    Null,
}

/// Represents a JSON-RPC 2.0 Request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JSONRPCRequest {
    /// The version of the JSON-RPC protocol. MUST be exactly "2.0".
    pub jsonrpc: String,
    /// A string containing the name of the method to be invoked.
    pub method: String,
    /// A structured value holding the parameter values to be used during the invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// A unique identifier established by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JSONRPCId>,
}

/// Represents a successful JSON-RPC 2.0 Response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JSONRPCSuccessResponse {
    /// The version of the JSON-RPC protocol. MUST be exactly "2.0".
    pub jsonrpc: String,
    /// The value of this member is determined by the method invoked on the server.
    pub result: serde_json::Value,
    /// The identifier established by the client.
    pub id: Option<JSONRPCId>,
}

/// Represents a JSON-RPC 2.0 Error object, included in an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JSONRPCError {
    /// A number that indicates the error type that occurred.
    pub code: i32,
    /// A string providing a short description of the error.
    pub message: String,
    /// A primitive or structured value containing additional information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Represents a JSON-RPC 2.0 Error Response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JSONRPCErrorResponse {
    /// The version of the JSON-RPC protocol. MUST be exactly "2.0".
    pub jsonrpc: String,
    /// An object describing the error that occurred.
    pub error: JSONRPCError,
    /// The identifier established by the client.
    pub id: Option<JSONRPCId>,
}

// Standard JSON-RPC error codes plus the A2A-specific range.
pub const JSON_PARSE_ERROR_CODE: i32 = -32700;
pub const INVALID_REQUEST_ERROR_CODE: i32 = -32600;
pub const METHOD_NOT_FOUND_ERROR_CODE: i32 = -32601;
pub const INVALID_PARAMS_ERROR_CODE: i32 = -32602;
pub const INTERNAL_ERROR_CODE: i32 = -32603;
pub const TASK_NOT_FOUND_ERROR_CODE: i32 = -32001;
pub const TASK_NOT_CANCELABLE_ERROR_CODE: i32 = -32002;
pub const UNSUPPORTED_OPERATION_ERROR_CODE: i32 = -32004;

// ============================================================================
// A2A Core Protocol Types (from schema)
// ============================================================================

/// Defines the lifecycle states of a Task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// The task has been submitted and is awaiting execution.
    Submitted,
    /// The agent is actively working on the task.
    Working,
    /// The task has been successfully completed.
    Completed,
    /// The task has been canceled by the user.
    Canceled,
    /// The task failed due to an error during execution.
    Failed,
}

impl TaskState {
    /// Whether no further state transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

/// Represents the status of a task at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    /// The current state of the task's lifecycle.
    pub state: TaskState,
    /// An ISO 8601 datetime string indicating when this status was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// An optional, human-readable message providing more details about the status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// Represents a single, stateful operation between a client and an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// The type of this object, used as a discriminator. Always 'task'.
    #[serde(default = "default_task_kind")]
    pub kind: String,
    /// A unique identifier for the task.
    pub id: String,
    /// An identifier maintaining context across related interactions.
    #[serde(rename = "contextId")]
    pub context_id: String,
    /// The current status of the task.
    pub status: TaskStatus,
    /// Messages exchanged during the task, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<Message>,
    /// Artifacts generated by the agent during execution.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub artifacts: Vec<Artifact>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_task_kind() -> String {
    TASK_KIND.to_string()
}

/// Identifies the sender of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// For messages sent by the client/user.
    User,
    /// For messages sent by the agent/service.
    Agent,
}

/// Represents a single message in the conversation between a user and an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The type of this object, used as a discriminator. Always 'message'.
    #[serde(default = "default_message_kind")]
    pub kind: String,
    /// A unique identifier for the message, generated by the sender.
    #[serde(rename = "messageId")]
    pub message_id: String,
    /// Identifies the sender of the message.
    pub role: MessageRole,
    /// An array of content parts that form the message body.
    pub parts: Vec<Part>,
    /// The context identifier grouping related interactions.
    #[serde(skip_serializing_if = "Option::is_none", rename = "contextId")]
    pub context_id: Option<String>,
    /// The identifier of the task this message is part of.
    #[serde(skip_serializing_if = "Option::is_none", rename = "taskId")]
    pub task_id: Option<String>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_message_kind() -> String {
    MESSAGE_KIND.to_string()
}

/// A discriminated union representing a part of a message or artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    /// Represents a text segment.
    Text {
        /// The string content of the text part.
        text: String,
        /// Optional metadata associated with this part.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, serde_json::Value>>,
    },
    /// Represents a file segment.
    File {
        /// The file content, represented as a URI reference.
        file: FileWithUri,
        /// Optional metadata associated with this part.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, serde_json::Value>>,
    },
    /// Represents a structured data segment (e.g., JSON).
    Data {
        /// The structured data content.
        data: serde_json::Value,
        /// Optional metadata associated with this part.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, serde_json::Value>>,
    },
}

impl Part {
    /// Convenience constructor for a bare text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            metadata: None,
        }
    }

    /// Convenience constructor for a bare data part.
    #[must_use]
    pub fn data(data: serde_json::Value) -> Self {
        Self::Data {
            data,
            metadata: None,
        }
    }

    /// The text content, when this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The structured content, when this is a data part.
    #[must_use]
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Represents a file with its content located at a specific URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileWithUri {
    /// A URL pointing to the file's content.
    pub uri: String,
    /// The MIME type of the file (e.g., "image/png").
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    /// An optional name for the file (e.g., "photo.png").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Represents a file or other resource generated by an agent during a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    /// A unique identifier for the artifact within the scope of the task.
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    /// An array of content parts that make up the artifact.
    pub parts: Vec<Part>,
    /// An optional, human-readable name for the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// An optional, human-readable description of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

// ============================================================================
// A2A Method Parameter Types (from schema)
// ============================================================================

/// Defines the parameters for a request to send a message to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSendParams {
    /// The message object being sent to the agent.
    pub message: Message,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Defines parameters containing a task ID, used for simple task operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdParams {
    /// The unique identifier of the task.
    pub id: String,
    /// Optional metadata associated with the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Defines parameters for querying a task, with an option to limit history length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueryParams {
    /// The unique identifier of the task.
    pub id: String,
    /// The number of most recent messages from the task's history to retrieve.
    #[serde(skip_serializing_if = "Option::is_none", rename = "historyLength")]
    pub history_length: Option<i32>,
    /// Optional metadata associated with the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

// ============================================================================
// Streaming Event Types (from schema)
// ============================================================================

/// An event sent by the agent to notify the client of a change in task status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusUpdateEvent {
    /// The type of this event. Always "status-update".
    #[serde(default = "default_status_update_kind")]
    pub kind: String,
    /// The ID of the task that was updated.
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// The context ID associated with the task.
    #[serde(rename = "contextId")]
    pub context_id: String,
    /// The new status of the task.
    pub status: TaskStatus,
    /// If true, this is the final event in the stream for this interaction.
    #[serde(rename = "final")]
    pub is_final: bool,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_status_update_kind() -> String {
    STATUS_UPDATE_KIND.to_string()
}

/// An event sent by the agent when an artifact has been generated or updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskArtifactUpdateEvent {
    /// The type of this event. Always "artifact-update".
    #[serde(default = "default_artifact_update_kind")]
    pub kind: String,
    /// The ID of the task this artifact belongs to.
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// The context ID associated with the task.
    #[serde(rename = "contextId")]
    pub context_id: String,
    /// The artifact that was generated or updated.
    pub artifact: Artifact,
    /// If true, this artifact appends to a previously sent artifact with the same ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
    /// If true, this is the final chunk of the artifact.
    #[serde(skip_serializing_if = "Option::is_none", rename = "lastChunk")]
    pub last_chunk: Option<bool>,
    /// Optional metadata for extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

fn default_artifact_update_kind() -> String {
    ARTIFACT_UPDATE_KIND.to_string()
}

/// The result of a `message/send` call, which can be a direct reply or a task object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendMessageResult {
    Task(Task),
    Message(Message),
}

/// The result of a `message/stream` call: an initial object or a streaming event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendStreamingMessageResult {
    Task(Task),
    Message(Message),
    TaskStatusUpdate(TaskStatusUpdateEvent),
    TaskArtifactUpdate(TaskArtifactUpdateEvent),
}

// Constants for discriminator values.
pub const PROTOCOL_VERSION: &str = "0.3.0";
pub const TASK_KIND: &str = "task";
pub const MESSAGE_KIND: &str = "message";
pub const STATUS_UPDATE_KIND: &str = "status-update";
pub const ARTIFACT_UPDATE_KIND: &str = "artifact-update";

use serde::{Deserialize, Serialize};

// ============================================================================
// A2A Agent Card and Discovery Types
// ============================================================================

/// Defines optional capabilities supported by an agent.
///
/// The gateway always emits all three flags, so they are plain booleans
/// rather than the schema's optional fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AgentCapabilities {
    /// Indicates if the agent supports streaming responses.
    pub streaming: bool,
    /// Indicates if the agent supports push notifications for task updates.
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
    /// Indicates if the agent provides a history of state transitions for a task.
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
}

/// Represents a distinct capability or function that an agent can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSkill {
    /// A unique identifier for the agent's skill.
    pub id: String,
    /// A human-readable name for the skill.
    pub name: String,
    /// A detailed description of the skill.
    pub description: String,
    /// A set of keywords describing the skill's capabilities.
    pub tags: Vec<String>,
}

/// The AgentCard is a self-describing manifest for an agent, served at the
/// agent's well-known discovery path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// A human-readable name for the agent.
    pub name: String,
    /// A human-readable description of the agent.
    pub description: String,
    /// The version of the A2A protocol this agent supports.
    #[serde(rename = "protocolVersion", default = "default_protocol_version")]
    pub protocol_version: String,
    /// The agent's own version number.
    pub version: String,
    /// The preferred endpoint URL for interacting with the agent.
    pub url: String,
    /// A declaration of optional capabilities supported by the agent.
    pub capabilities: AgentCapabilities,
    /// Default set of supported input modes for all skills.
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    /// Default set of supported output modes for all skills.
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    /// The set of skills that the agent can perform.
    pub skills: Vec<AgentSkill>,
}

fn default_protocol_version() -> String {
    crate::PROTOCOL_VERSION.to_string()
}

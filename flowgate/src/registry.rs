//! Resolved agent descriptors and their precomputed discovery cards.

use std::collections::HashMap;

use a2a_types::{AgentCapabilities, AgentCard, AgentSkill};

use crate::config::{AgentDescriptor, TransportKind};
use crate::errors::ConfigError;

/// Holds every configured agent with O(1) lookup by id. Cards are computed
/// once at construction; descriptors are immutable afterwards.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentDescriptor>,
    cards: HashMap<String, AgentCard>,
    /// Ids in configuration order, for stable listings.
    order: Vec<String>,
}

impl AgentRegistry {
    /// Builds the registry, rejecting duplicate ids.
    pub fn new(descriptors: Vec<AgentDescriptor>, base_url: &str) -> Result<Self, ConfigError> {
        let mut agents = HashMap::new();
        let mut cards = HashMap::new();
        let mut order = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let id = descriptor.id.clone();
            if agents.contains_key(&id) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate agent id '{id}'"),
                });
            }
            cards.insert(id.clone(), build_card(&descriptor, base_url));
            agents.insert(id.clone(), descriptor);
            order.push(id);
        }

        Ok(Self {
            agents,
            cards,
            order,
        })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.agents.get(id)
    }

    #[must_use]
    pub fn card(&self, id: &str) -> Option<&AgentCard> {
        self.cards.get(id)
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// All discovery cards, in configuration order.
    #[must_use]
    pub fn cards(&self) -> Vec<&AgentCard> {
        self.order
            .iter()
            .filter_map(|id| self.cards.get(id))
            .collect()
    }

    /// All descriptors, in configuration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<&AgentDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn build_card(descriptor: &AgentDescriptor, base_url: &str) -> AgentCard {
    let base = base_url.trim_end_matches('/');
    AgentCard {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        protocol_version: a2a_types::PROTOCOL_VERSION.to_string(),
        version: descriptor.version.clone(),
        url: format!("{base}/agents/{}/", descriptor.id),
        capabilities: AgentCapabilities {
            streaming: descriptor.transport == TransportKind::Socket,
            push_notifications: false,
            state_transition_history: false,
        },
        default_input_modes: vec!["text".to_string()],
        default_output_modes: vec!["text".to_string()],
        skills: descriptor
            .skills
            .iter()
            .map(|skill| AgentSkill {
                id: skill.id.clone(),
                name: skill.name.clone(),
                description: skill.description.clone(),
                tags: skill.tags.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SkillDescriptor;

    fn descriptor(id: &str, transport: TransportKind) -> AgentDescriptor {
        AgentDescriptor {
            id: id.into(),
            name: format!("Agent {id}"),
            description: "A flow".into(),
            version: "2.1.0".into(),
            transport,
            endpoint_url: "https://endpoint.example/api".into(),
            endpoint_token: "tok".into(),
            skills: vec![SkillDescriptor {
                id: "faq".into(),
                name: "FAQ".into(),
                description: "Answers questions".into(),
                tags: vec!["support".into()],
            }],
        }
    }

    #[test]
    fn builds_cards_with_the_discovery_shape() {
        let registry = AgentRegistry::new(
            vec![
                descriptor("rest-agent", TransportKind::Rest),
                descriptor("socket-agent", TransportKind::Socket),
            ],
            "http://localhost:3000/",
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.has("rest-agent"));
        assert!(!registry.has("missing"));

        let card = registry.card("socket-agent").unwrap();
        assert_eq!(card.url, "http://localhost:3000/agents/socket-agent/");
        assert_eq!(card.protocol_version, "0.3.0");
        assert!(card.capabilities.streaming);
        assert!(!card.capabilities.push_notifications);
        assert_eq!(card.default_input_modes, vec!["text".to_string()]);
        assert_eq!(card.skills.len(), 1);

        let card = registry.card("rest-agent").unwrap();
        assert!(!card.capabilities.streaming);
    }

    #[test]
    fn listing_preserves_configuration_order() {
        let registry = AgentRegistry::new(
            vec![
                descriptor("b", TransportKind::Rest),
                descriptor("a", TransportKind::Rest),
            ],
            "http://localhost:3000",
        )
        .unwrap();
        let names: Vec<&str> = registry.cards().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Agent b", "Agent a"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = AgentRegistry::new(
            vec![
                descriptor("a", TransportKind::Rest),
                descriptor("a", TransportKind::Socket),
            ],
            "http://localhost:3000",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}

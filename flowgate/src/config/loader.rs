use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::AgentDescriptor;
use crate::errors::ConfigError;

/// The agents document: a JSON object with a root `agents` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub agents: Vec<AgentDescriptor>,
}

/// Loads and validates the agents document from a file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

/// Parses the agents document, resolving `${VAR}` placeholders from the
/// environment before deserializing, then validates the result.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut value: Value = serde_json::from_str(content)?;
    resolve_placeholders(&mut value)?;
    let config: GatewayConfig = serde_json::from_value(value)?;
    validate(&config)?;
    Ok(config)
}

/// Walks every string in the document and substitutes `${VAR}` references.
/// A variable that is unset or resolves to an empty string is fatal.
fn resolve_placeholders(value: &mut Value) -> Result<(), ConfigError> {
    match value {
        Value::String(s) => {
            if s.contains("${") {
                *s = substitute(s)?;
            }
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(resolve_placeholders),
        Value::Object(map) => map.values_mut().try_for_each(resolve_placeholders),
        _ => Ok(()),
    }
}

fn substitute(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or_else(|| ConfigError::Invalid {
            reason: format!("unterminated placeholder in '{input}'"),
        })?;
        let name = &tail[..end];
        let resolved = std::env::var(name).unwrap_or_default();
        if resolved.is_empty() {
            return Err(ConfigError::MissingEnv { name: name.into() });
        }
        out.push_str(&resolved);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_url_safe(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.agents.is_empty() {
        return Err(ConfigError::Invalid {
            reason: "no agents configured".into(),
        });
    }

    let mut seen = HashSet::new();
    for agent in &config.agents {
        if !is_url_safe(&agent.id) {
            return Err(ConfigError::Invalid {
                reason: format!("agent id '{}' is not URL-safe", agent.id),
            });
        }
        if !seen.insert(agent.id.as_str()) {
            return Err(ConfigError::Invalid {
                reason: format!("duplicate agent id '{}'", agent.id),
            });
        }
        if agent.name.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!("agent '{}' has an empty name", agent.id),
            });
        }
        if agent.endpoint_url.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!("agent '{}' has an empty endpoint URL", agent.id),
            });
        }
        if agent.endpoint_token.is_empty() {
            return Err(ConfigError::Invalid {
                reason: format!("agent '{}' has an empty endpoint token", agent.id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;

    fn config_json(id: &str, url: &str) -> String {
        format!(
            r#"{{
              "agents": [
                {{
                  "id": "{id}",
                  "name": "Support",
                  "description": "Customer support flow",
                  "version": "1.0.0",
                  "transport": "rest",
                  "endpointUrl": "{url}",
                  "endpointToken": "tok-1",
                  "skills": [
                    {{ "id": "faq", "name": "FAQ", "description": "Answers questions", "tags": ["support"] }}
                  ]
                }}
              ]
            }}"#
        )
    }

    #[test]
    fn parses_a_valid_document() {
        let config = parse_config(&config_json("support", "https://e.example/api")).unwrap();
        assert_eq!(config.agents.len(), 1);
        let agent = &config.agents[0];
        assert_eq!(agent.id, "support");
        assert_eq!(agent.transport, TransportKind::Rest);
        assert_eq!(agent.skills[0].tags, vec!["support".to_string()]);
    }

    #[test]
    fn resolves_env_placeholders() {
        std::env::set_var("FLOWGATE_TEST_ENDPOINT", "https://resolved.example");
        let config =
            parse_config(&config_json("support", "${FLOWGATE_TEST_ENDPOINT}/api")).unwrap();
        assert_eq!(
            config.agents[0].endpoint_url,
            "https://resolved.example/api"
        );
    }

    #[test]
    fn missing_env_variable_is_fatal() {
        let err = parse_config(&config_json("support", "${FLOWGATE_TEST_UNSET_VAR}/api"))
            .unwrap_err();
        match err {
            ConfigError::MissingEnv { name } => assert_eq!(name, "FLOWGATE_TEST_UNSET_VAR"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_env_variable_is_fatal() {
        std::env::set_var("FLOWGATE_TEST_EMPTY_VAR", "");
        let err =
            parse_config(&config_json("support", "${FLOWGATE_TEST_EMPTY_VAR}/api")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc = r#"{
          "agents": [
            { "id": "a", "name": "A", "description": "", "version": "1", "transport": "rest",
              "endpointUrl": "https://e.example", "endpointToken": "t" },
            { "id": "a", "name": "B", "description": "", "version": "1", "transport": "socket",
              "endpointUrl": "https://e.example", "endpointToken": "t" }
          ]
        }"#;
        let err = parse_config(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn url_unsafe_id_is_rejected() {
        let err = parse_config(&config_json("bad id!", "https://e.example")).unwrap_err();
        assert!(err.to_string().contains("URL-safe"));
    }

    #[test]
    fn zero_agents_is_fatal() {
        let err = parse_config(r#"{ "agents": [] }"#).unwrap_err();
        assert!(err.to_string().contains("no agents"));
    }
}

//! Translates raw backend outputs into A2A event payloads.
//!
//! Pure: no I/O and no suspension. Every produced output carries at least
//! one text-bearing part, so text-only clients never see an empty event.

pub mod mime;
pub mod render;

use serde_json::{json, Map, Value};
use tracing::warn;

use a2a_types::{FileWithUri, Part};

use crate::adapters::RawFlowOutput;
use crate::errors::{GatewayError, GatewayResult};

pub use mime::MediaKind;

/// The normalized form of one backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedOutput {
    /// Conversational content: a rendered text part, optionally followed by
    /// a data part keyed by its type name.
    StatusMessage { parts: Vec<Part> },
    /// A binary media reference: a file part plus a text fallback.
    MediaArtifact {
        parts: Vec<Part>,
        mime_type: String,
        name: String,
        file_url: String,
    },
}

impl NormalizedOutput {
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        match self {
            Self::StatusMessage { parts } | Self::MediaArtifact { parts, .. } => parts,
        }
    }
}

/// Translates one raw backend output. Classification is a fixed priority:
/// media keys, then structured UI keys, then custom data, then bare text.
pub fn normalize(output: &RawFlowOutput) -> GatewayResult<NormalizedOutput> {
    let data = output.data.as_ref().and_then(Value::as_object);

    if let Some(map) = data {
        for kind in MediaKind::ALL {
            if map.contains_key(kind.data_key()) {
                return media_artifact(map, kind);
            }
        }

        for (key, label) in [
            ("_quickReplies", "quick_replies"),
            ("_gallery", "carousel"),
            ("_buttons", "buttons"),
            ("_list", "list"),
            ("_adaptiveCard", "AdaptiveCard"),
        ] {
            if let Some(payload) = map.get(key) {
                return Ok(structured_message(output, key, label, payload));
            }
        }

        return Ok(custom_message(output, map));
    }

    // No data at all: a plain (possibly empty) text message.
    let text = output.non_empty_text().unwrap_or_else(|| {
        warn!("backend output carried neither text nor data; emitting empty text part");
        ""
    });
    Ok(NormalizedOutput::StatusMessage {
        parts: vec![Part::text(text)],
    })
}

fn media_artifact(
    map: &Map<String, Value>,
    kind: MediaKind,
) -> GatewayResult<NormalizedOutput> {
    let url = map
        .get(kind.data_key())
        .and_then(|media| media.get(kind.url_field()))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| GatewayError::MalformedOutput {
            reason: format!(
                "{} output is missing its {} field",
                kind.data_key(),
                kind.url_field()
            ),
        })?;

    let mime_type = mime::infer_mime(url, kind);
    let name = mime::file_name(url, kind);
    let fallback = format!("[{}: {url}]", kind.label());

    let parts = vec![
        Part::File {
            file: FileWithUri {
                uri: url.to_string(),
                mime_type: Some(mime_type.clone()),
                name: Some(name.clone()),
            },
            metadata: None,
        },
        Part::text(fallback),
    ];

    Ok(NormalizedOutput::MediaArtifact {
        parts,
        mime_type,
        name,
        file_url: url.to_string(),
    })
}

fn structured_message(
    output: &RawFlowOutput,
    key: &str,
    label: &str,
    payload: &Value,
) -> NormalizedOutput {
    let original = output.non_empty_text();
    let rendered = match key {
        "_quickReplies" => render::quick_replies(payload),
        "_gallery" => render::gallery(payload, original),
        "_buttons" => render::buttons(payload),
        "_list" => render::list(payload),
        _ => render::adaptive_card(payload),
    };

    // The gallery renderer folds the original text into its own intro line;
    // everything else gets the original text prepended.
    let text = if key == "_gallery" {
        rendered
    } else {
        join_text(original, &rendered)
    };

    NormalizedOutput::StatusMessage {
        parts: vec![
            Part::text(text),
            Part::data(json!({ "type": label, "payload": payload })),
        ],
    }
}

fn join_text(original: Option<&str>, rendered: &str) -> String {
    match original {
        Some(text) if !rendered.is_empty() => format!("{text}\n{rendered}"),
        Some(text) => text.to_string(),
        None => rendered.to_string(),
    }
}

fn custom_message(output: &RawFlowOutput, map: &Map<String, Value>) -> NormalizedOutput {
    let text = output
        .non_empty_text()
        .or_else(|| {
            map.get("_fallbackText")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or("");

    let remaining: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| key.as_str() != "_fallbackText" && key.as_str() != "_cognigy")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut parts = vec![Part::text(text)];
    if !remaining.is_empty() {
        parts.push(Part::data(json!({
            "type": "cognigy/data",
            "payload": Value::Object(remaining)
        })));
    }
    NormalizedOutput::StatusMessage { parts }
}

/// Maps a list of raw outputs into one flat ordered part sequence, used by
/// the REST path to pack all outputs into a single response message. An
/// output that fails to normalize is logged and skipped; flattening never
/// fails the request. Empty input yields a single empty text part.
#[must_use]
pub fn flatten(outputs: &[RawFlowOutput]) -> Vec<Part> {
    let mut parts = Vec::new();
    for output in outputs {
        match normalize(output) {
            Ok(normalized) => parts.extend_from_slice(normalized.parts()),
            Err(err) => warn!(error = %err, "skipping backend output that failed to normalize"),
        }
    }
    if parts.is_empty() {
        parts.push(Part::text(""));
    }
    parts
}

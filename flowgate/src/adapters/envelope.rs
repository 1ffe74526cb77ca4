//! Shared unwrapping of the upstream's `data._cognigy._default.<type>`
//! envelope, so the normalizer always sees the expected top-level key shape.

use serde_json::{json, Map, Value};

use super::RawFlowOutput;

/// The structured UI keys recognized inside a `_default` envelope.
pub const STRUCTURED_KEYS: [&str; 5] = [
    "_quickReplies",
    "_gallery",
    "_buttons",
    "_list",
    "_adaptiveCard",
];

/// The media keys recognized at the data root.
pub const MEDIA_KEYS: [&str; 3] = ["_image", "_audio", "_video"];

/// JSON-decodes a data field that arrives as a string; other values pass
/// through unchanged.
#[must_use]
pub fn decode_data(data: Option<Value>) -> Option<Value> {
    match data {
        Some(Value::String(s)) => serde_json::from_str(&s).ok(),
        other => other,
    }
}

fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

fn default_envelope(data: &Map<String, Value>) -> Option<&Map<String, Value>> {
    data.get("_cognigy")?.get("_default")?.as_object()
}

/// An output is internal metadata iff its text is empty or absent and its
/// data holds nothing but a `_cognigy` envelope without a `_default` child
/// (fields like `_messageId` or `_finishReason`). Entries whose `_cognigy`
/// map contains `_default` wrap real UI output and must not be dropped.
#[must_use]
pub fn is_internal_metadata(output: &RawFlowOutput) -> bool {
    if output.non_empty_text().is_some() {
        return false;
    }
    let Some(map) = as_object(output.data.as_ref()) else {
        return false;
    };
    !map.is_empty()
        && map.keys().all(|key| key == "_cognigy")
        && map
            .get("_cognigy")
            .and_then(Value::as_object)
            .is_some_and(|cognigy| !cognigy.contains_key("_default"))
}

/// Expands one raw output into the entries the normalizer consumes:
///
/// - structured content under `_cognigy._default` is lifted to the top
///   level, one entry per known key, with no text (the normalizer
///   re-renders it);
/// - media keys at the data root become one entry per key;
/// - outputs with text pass through unchanged;
/// - `_cognigy`-only metadata envelopes vanish;
/// - anything else (custom data) is forwarded unchanged.
#[must_use]
pub fn expand_output(raw: RawFlowOutput) -> Vec<RawFlowOutput> {
    let data = decode_data(raw.data);
    let raw = RawFlowOutput {
        text: raw.text,
        data,
    };

    if let Some(map) = as_object(raw.data.as_ref()) {
        if let Some(wrapped) = default_envelope(map) {
            let entries: Vec<RawFlowOutput> = STRUCTURED_KEYS
                .iter()
                .filter_map(|key| wrapped.get(*key).map(|payload| (*key, payload.clone())))
                .map(|(key, payload)| RawFlowOutput::from_data(json!({ key: payload })))
                .collect();
            if !entries.is_empty() {
                return entries;
            }
        }

        let media: Vec<RawFlowOutput> = MEDIA_KEYS
            .iter()
            .filter_map(|key| map.get(*key).map(|payload| (*key, payload.clone())))
            .map(|(key, payload)| RawFlowOutput::from_data(json!({ key: payload })))
            .collect();
        if !media.is_empty() {
            return media;
        }
    }

    if raw.non_empty_text().is_some() {
        return vec![raw];
    }

    if is_internal_metadata(&raw) {
        return Vec::new();
    }

    if raw.data.is_some() {
        return vec![raw];
    }

    Vec::new()
}

//! Human-readable text rendering for structured UI outputs.
//!
//! Every renderer trims its inputs and skips items with empty titles, so
//! the produced text never carries blank bullet lines.

use serde_json::Value;

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("").trim()
}

fn items<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value
        .get(field)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn push_line(lines: &mut Vec<String>, line: String) {
    if !line.is_empty() {
        lines.push(line);
    }
}

/// `<label>\n- <title>` per option, with an inline image reference when the
/// option carries one.
#[must_use]
pub fn quick_replies(payload: &Value) -> String {
    let mut lines = Vec::new();
    push_line(&mut lines, str_field(payload, "text").to_string());
    for option in items(payload, "quickReplies") {
        let title = str_field(option, "title");
        if title.is_empty() {
            continue;
        }
        let image = str_field(option, "imageUrl");
        if image.is_empty() {
            lines.push(format!("- {title}"));
        } else {
            lines.push(format!("- {title} ![image]({image})"));
        }
    }
    lines.join("\n")
}

/// `<label>\n- <title>` per button; web-link buttons append their URL.
#[must_use]
pub fn buttons(payload: &Value) -> String {
    let mut lines = Vec::new();
    push_line(&mut lines, str_field(payload, "text").to_string());
    for button in items(payload, "buttons") {
        let title = str_field(button, "title");
        if title.is_empty() {
            continue;
        }
        let url = str_field(button, "url");
        if str_field(button, "type") == "web_url" && !url.is_empty() {
            lines.push(format!("- {title}: {url}"));
        } else {
            lines.push(format!("- {title}"));
        }
    }
    lines.join("\n")
}

/// `<header>\n- <title>[: <subtitle>][ ![image](<url>)]` per item. The
/// header falls back to the legacy `text` field when `header` is absent.
#[must_use]
pub fn list(payload: &Value) -> String {
    let mut lines = Vec::new();
    let header = str_field(payload, "header");
    let header = if header.is_empty() {
        str_field(payload, "text")
    } else {
        header
    };
    push_line(&mut lines, header.to_string());
    for item in items(payload, "items") {
        if let Some(line) = card_line(item) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Intro sentence followed by one line per card. The intro is the original
/// output text when present, otherwise a fixed default, and is emitted even
/// for an empty carousel.
#[must_use]
pub fn gallery(payload: &Value, original_text: Option<&str>) -> String {
    let intro = original_text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Here are some options:");
    let mut lines = vec![intro.to_string()];
    for card in items(payload, "items") {
        if let Some(line) = card_line(card) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn card_line(card: &Value) -> Option<String> {
    let title = str_field(card, "title");
    if title.is_empty() {
        return None;
    }
    let mut line = format!("- {title}");
    let subtitle = str_field(card, "subtitle");
    if !subtitle.is_empty() {
        line.push_str(": ");
        line.push_str(subtitle);
    }
    let image = str_field(card, "imageUrl");
    if !image.is_empty() {
        line.push_str(&format!(" ![image]({image})"));
    }
    Some(line)
}

/// Depth-first rendering of a rich card body and its actions.
#[must_use]
pub fn adaptive_card(payload: &Value) -> String {
    let card = payload.get("adaptiveCard").unwrap_or(payload);
    let mut lines = Vec::new();
    for element in items(card, "body") {
        render_card_element(element, &mut lines);
    }
    for action in items(card, "actions") {
        render_card_element(action, &mut lines);
    }
    lines.join("\n")
}

fn render_card_element(element: &Value, lines: &mut Vec<String>) {
    match str_field(element, "type") {
        "TextBlock" => push_line(lines, str_field(element, "text").to_string()),
        "FactSet" => {
            for fact in items(element, "facts") {
                let title = str_field(fact, "title");
                let value = str_field(fact, "value");
                if !title.is_empty() || !value.is_empty() {
                    lines.push(format!("{title}: {value}"));
                }
            }
        }
        "Input.Text" | "Input.Date" | "Input.Number" | "Input.Time" => {
            let label = str_field(element, "label");
            let placeholder = str_field(element, "placeholder");
            match (label.is_empty(), placeholder.is_empty()) {
                (false, false) => lines.push(format!("{label} ({placeholder})")),
                (false, true) => lines.push(label.to_string()),
                (true, false) => lines.push(placeholder.to_string()),
                (true, true) => {}
            }
        }
        "Input.ChoiceSet" => {
            push_line(lines, str_field(element, "label").to_string());
            for choice in items(element, "choices") {
                let title = str_field(choice, "title");
                if !title.is_empty() {
                    lines.push(format!("- {title}"));
                }
            }
        }
        "Input.Toggle" => push_line(lines, str_field(element, "title").to_string()),
        "ColumnSet" => {
            for column in items(element, "columns") {
                for item in items(column, "items") {
                    render_card_element(item, lines);
                }
            }
        }
        "Container" => {
            for item in items(element, "items") {
                render_card_element(item, lines);
            }
        }
        "Action.Submit" | "Action.OpenUrl" | "Action.ShowCard" | "Action.Execute" => {
            let title = str_field(element, "title");
            if !title.is_empty() {
                lines.push(format!("[Action: {title}]"));
            }
        }
        // Unknown element types are skipped silently.
        _ => {}
    }
}

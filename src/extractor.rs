//! Caption extraction from slide-status payloads.
//!
//! The producer has placed the current slide under different keys across
//! releases, so the text is located by probing an ordered list of paths and
//! taking the first one that yields non-empty text.

use crate::types::{ExtractedContent, SlideStatus};
use serde_json::Value;
use tracing::{debug, trace};

/// Slide locations probed in order, first match wins
const SLIDE_PATHS: &[&[&str]] = &[
    &["data", "current"],
    &["data", "slide", "current"],
    &["current"],
    &["slide"],
];

const TEXT_FIELD: &str = "text";
const NOTES_FIELD: &str = "notes";

/// Notes override configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesSettings {
    /// Whether the notes override is active
    pub enabled: bool,
    /// Marker that reserves a slide for notes
    pub trigger: String,
}

impl Default for NotesSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger: crate::session::DEFAULT_NOTES_TRIGGER.to_string(),
        }
    }
}

/// Extract the displayable caption from a slide-status payload.
///
/// Returns `None` when the payload carries no text, or when notes mode is on
/// and the slide text is exactly the trigger marker.
pub fn extract(payload: &SlideStatus, notes: &NotesSettings) -> Option<ExtractedContent> {
    let text = match probe(payload, TEXT_FIELD) {
        Some(text) => text,
        None => {
            debug!("No text found in any candidate field");
            return None;
        }
    };

    if notes.enabled {
        if text == notes.trigger {
            debug!("Text is exactly the notes trigger, treating as empty slide");
            return None;
        }

        if text.contains(notes.trigger.as_str()) {
            debug!(trigger = %notes.trigger, "Text contains notes trigger, trying notes field");
            if let Some(notes_text) = probe(payload, NOTES_FIELD) {
                debug!(chars = notes_text.len(), "Using notes instead of text");
                return Some(ExtractedContent::from_notes(notes_text));
            }
            debug!("No notes found, keeping slide text");
        }
    }

    debug!(chars = text.len(), "Extracted slide text");
    Some(ExtractedContent::from_text(text))
}

/// Probe every slide location for `field`, returning the first non-empty
/// normalized value.
fn probe(payload: &Value, field: &str) -> Option<String> {
    SLIDE_PATHS.iter().find_map(|path| {
        let slide = lookup(payload, path)?;
        let value = slide.get(field)?;
        let normalized = normalize(value);
        trace!(path = %path.join("."), field, found = normalized.is_some(), "Probed candidate");
        normalized
    })
}

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |node, key| node.get(key))
}

/// Collapse a candidate into trimmed text.
///
/// Sequences are treated as lines and scalars are coerced to strings.
/// `false` and anything that trims to nothing count as absent.
pub fn normalize(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Array(lines) => lines
            .iter()
            .map(scalar_line)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        Value::Null | Value::Bool(false) | Value::Object(_) => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn scalar_line(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn notes_mode(trigger: &str) -> NotesSettings {
        NotesSettings {
            enabled: true,
            trigger: trigger.to_string(),
        }
    }

    #[test]
    fn test_current_text() {
        let payload = json!({ "current": { "text": "  Line A  " } });
        assert_eq!(
            extract(&payload, &NotesSettings::default()),
            Some(ExtractedContent::from_text("Line A"))
        );
    }

    #[test]
    fn test_probe_order_prefers_data_current() {
        let payload = json!({
            "data": { "current": { "text": "from data" } },
            "current": { "text": "from current" }
        });
        assert_eq!(
            extract(&payload, &NotesSettings::default()).unwrap().text,
            "from data"
        );
    }

    #[test]
    fn test_all_schema_locations() {
        let payloads = [
            json!({ "data": { "current": { "text": "x" } } }),
            json!({ "data": { "slide": { "current": { "text": "x" } } } }),
            json!({ "current": { "text": "x" } }),
            json!({ "slide": { "text": "x" } }),
        ];
        for payload in payloads {
            assert_eq!(extract(&payload, &NotesSettings::default()).unwrap().text, "x");
        }
    }

    #[test]
    fn test_empty_candidate_falls_through() {
        let payload = json!({
            "data": { "current": { "text": "   " } },
            "slide": { "text": "fallback" }
        });
        assert_eq!(
            extract(&payload, &NotesSettings::default()).unwrap().text,
            "fallback"
        );
    }

    #[test]
    fn test_line_array_joined() {
        let payload = json!({ "current": { "text": ["Amazing grace", "how sweet the sound", ""] } });
        assert_eq!(
            extract(&payload, &NotesSettings::default()).unwrap().text,
            "Amazing grace\nhow sweet the sound"
        );
    }

    #[test]
    fn test_scalar_coerced() {
        let payload = json!({ "current": { "text": 316 } });
        assert_eq!(extract(&payload, &NotesSettings::default()).unwrap().text, "316");
    }

    #[test]
    fn test_boolean_text() {
        let payload = json!({ "current": { "text": true } });
        assert_eq!(extract(&payload, &NotesSettings::default()).unwrap().text, "true");

        let payload = json!({
            "current": { "text": false },
            "slide": { "text": "fallback" }
        });
        assert_eq!(
            extract(&payload, &NotesSettings::default()).unwrap().text,
            "fallback"
        );
    }

    #[test]
    fn test_missing_or_null_payload() {
        assert_eq!(extract(&Value::Null, &NotesSettings::default()), None);
        assert_eq!(extract(&json!({ "next": { "text": "x" } }), &NotesSettings::default()), None);
        assert_eq!(extract(&json!({ "current": { "text": "" } }), &NotesSettings::default()), None);
    }

    #[test]
    fn test_trigger_only_slide_is_empty() {
        let payload = json!({ "current": { "text": "CUE", "notes": "ignored" } });
        assert_eq!(extract(&payload, &notes_mode("CUE")), None);
    }

    #[test]
    fn test_trigger_uses_notes() {
        let payload = json!({ "current": { "text": "Verse 1 CUE", "notes": "Chorus text" } });
        assert_eq!(
            extract(&payload, &notes_mode("CUE")),
            Some(ExtractedContent::from_notes("Chorus text"))
        );
    }

    #[test]
    fn test_trigger_without_notes_keeps_text() {
        let payload = json!({ "current": { "text": "Verse 1 CUE", "notes": "  " } });
        assert_eq!(
            extract(&payload, &notes_mode("CUE")),
            Some(ExtractedContent::from_text("Verse 1 CUE"))
        );
    }

    #[test]
    fn test_notes_probed_across_locations() {
        let payload = json!({
            "current": { "text": "Verse CUE" },
            "slide": { "notes": ["Line one", "Line two"] }
        });
        assert_eq!(
            extract(&payload, &notes_mode("CUE")),
            Some(ExtractedContent::from_notes("Line one\nLine two"))
        );
    }

    #[test]
    fn test_notes_mode_disabled_ignores_trigger() {
        let payload = json!({ "current": { "text": "CUE", "notes": "Chorus text" } });
        assert_eq!(
            extract(&payload, &NotesSettings { enabled: false, trigger: "CUE".into() }),
            Some(ExtractedContent::from_text("CUE"))
        );
    }
}

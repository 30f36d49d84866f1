use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::models::Note;

/// Markdown replies longer than this are cut off with an explicit notice;
/// agent transports truncate silently otherwise.
pub const CHARACTER_LIMIT: usize = 25_000;

/// Output encoding the caller wants back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

/// A resolved operation result, carrying both output encodings.
///
/// Both forms are derived once from the same underlying result; picking one
/// later never re-queries the service.
#[derive(Debug)]
pub struct Reply {
    pub structured: serde_json::Value,
    pub text: String,
    pub is_error: bool,
}

impl Reply {
    pub fn success(structured: serde_json::Value, text: String) -> Self {
        Reply {
            structured,
            text,
            is_error: false,
        }
    }

    /// Structured failure reply: a kind from the error taxonomy plus a
    /// human-readable, actionable message.
    pub fn failure(kind: &str, message: String) -> Self {
        Reply {
            structured: serde_json::json!({
                "error": { "kind": kind, "message": message }
            }),
            text: format!("Error: {}", message),
            is_error: true,
        }
    }

    pub fn render(&self, format: ResponseFormat) -> String {
        match format {
            ResponseFormat::Markdown => self.text.clone(),
            ResponseFormat::Json => {
                serde_json::to_string_pretty(&self.structured).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

/// Format a Unix timestamp in milliseconds the way Joplin stores them.
pub fn format_timestamp(ts: Option<i64>) -> String {
    match ts.and_then(DateTime::from_timestamp_millis) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => "unknown".to_string(),
    }
}

/// Cut an over-long markdown reply, telling the caller how to narrow it.
pub fn truncate(text: String, item_count: usize) -> String {
    if text.len() <= CHARACTER_LIMIT {
        return text;
    }

    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i < CHARACTER_LIMIT - 200)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    format!(
        "{}\n\n---\n**Response truncated** ({} items). Use filters to narrow results.",
        &text[..cut],
        item_count
    )
}

/// Markdown heading for a note in a listing, with a to-do checkbox when the
/// note is one.
pub fn note_heading(note: &Note) -> String {
    if note.is_todo_item() {
        let status = if note.is_completed() { "[x]" } else { "[ ]" };
        format!("### {} {}", status, note.title)
    } else {
        format!("### {}", note.title)
    }
}

/// One listing entry: heading plus id and last-updated lines.
pub fn note_listing_entry(note: &Note) -> String {
    format!(
        "{}\n- **ID**: `{}`\n- **Updated**: {}\n",
        note_heading(note),
        note.id,
        format_timestamp(note.updated_time)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, is_todo: i64, todo_completed: i64) -> Note {
        Note {
            id: "n1".to_string(),
            title: title.to_string(),
            body: None,
            parent_id: String::new(),
            is_todo,
            todo_completed,
            created_time: None,
            updated_time: None,
            source_url: None,
        }
    }

    #[test]
    fn test_note_heading_checkboxes() {
        assert_eq!(note_heading(&note("Plain", 0, 0)), "### Plain");
        assert_eq!(note_heading(&note("Open", 1, 0)), "### [ ] Open");
        assert_eq!(
            note_heading(&note("Done", 1, 1700000000000)),
            "### [x] Done"
        );
    }

    #[test]
    fn test_format_timestamp_unknown() {
        assert_eq!(format_timestamp(None), "unknown");
        assert!(format_timestamp(Some(1700000000000)).starts_with("2023-11-1"));
    }

    #[test]
    fn test_truncate_leaves_short_text_alone() {
        let text = "short".to_string();
        assert_eq!(truncate(text.clone(), 1), text);
    }

    #[test]
    fn test_truncate_cuts_and_annotates() {
        let text = "x".repeat(CHARACTER_LIMIT + 1000);
        let out = truncate(text, 42);
        assert!(out.len() < CHARACTER_LIMIT + 200);
        assert!(out.contains("Response truncated"));
        assert!(out.contains("42 items"));
    }

    #[test]
    fn test_reply_renders_both_encodings_from_one_result() {
        let reply = Reply::success(
            serde_json::json!({"id": "n1", "title": "Hello"}),
            "# Hello".to_string(),
        );
        assert_eq!(reply.render(ResponseFormat::Markdown), "# Hello");
        let json = reply.render(ResponseFormat::Json);
        assert!(json.contains("\"title\": \"Hello\""));
        assert!(!reply.is_error);
    }

    #[test]
    fn test_failure_reply_shape() {
        let reply = Reply::failure("transport_error", "cannot connect".to_string());
        assert!(reply.is_error);
        assert_eq!(reply.structured["error"]["kind"], "transport_error");
        assert!(reply.text.starts_with("Error:"));
    }

    #[test]
    fn test_response_format_parses_lowercase() {
        let format: ResponseFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, ResponseFormat::Json);
        assert_eq!(ResponseFormat::default(), ResponseFormat::Markdown);
    }
}

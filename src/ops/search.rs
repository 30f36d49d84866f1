use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use super::Operation;
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::joplin::JoplinClient;
use crate::models::Note;
use crate::render::{note_listing_entry, truncate, Reply};

const SEARCH_FIELDS: &[&str] = &[
    "id",
    "title",
    "parent_id",
    "updated_time",
    "is_todo",
    "todo_completed",
];

fn default_search_limit() -> u32 {
    20
}

/// Searches notes with Joplin's own query syntax. The query string goes
/// through verbatim: the service is the authority on what it means, and a
/// malformed query is its error to report.
pub struct SearchNotes;

#[derive(Debug, Deserialize)]
pub struct SearchNotesArgs {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

#[async_trait::async_trait]
impl Operation for SearchNotes {
    type Args = SearchNotesArgs;

    fn name(&self) -> &'static str {
        "joplin_search_notes"
    }

    fn description(&self) -> &'static str {
        "Search notes using query syntax with title:, body:, tag:, notebook:, type:, \
         iscompleted: and date prefixes. Examples: \"tag:work type:todo\", \"title:meeting\". \
         Returns matching note metadata."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query, passed to the service unmodified"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (1-100, default 20)"
                },
                "response_format": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "description": "Reply encoding: human-readable markdown (default) or structured JSON"
                }
            },
            "required": ["query"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        if args.query.is_empty() {
            return Err(GatewayError::Validation(
                "search query must not be empty".to_string(),
            ));
        }

        let limit = args.limit.clamp(1, 100) as usize;
        let filters = vec![
            ("query".to_string(), args.query.clone()),
            ("type".to_string(), "note".to_string()),
        ];

        let notes: Vec<Note> = client
            .fetch_all(Resource::Search, "search", filters, SEARCH_FIELDS)
            .take(limit)
            .try_collect()
            .await?;

        let text = if notes.is_empty() {
            format!("No notes found matching '{}'.", args.query)
        } else {
            let mut lines = vec![
                format!("# Search results: '{}'", args.query),
                format!("*Found {} notes*", notes.len()),
                String::new(),
            ];
            lines.extend(notes.iter().map(note_listing_entry));
            truncate(lines.join("\n"), notes.len())
        };

        Ok(Reply::success(
            json!({ "query": args.query, "notes": notes }),
            text,
        ))
    }
}

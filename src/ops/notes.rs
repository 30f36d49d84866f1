use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use super::{tags, Operation, TitleFold};
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::joplin::JoplinClient;
use crate::models::Note;
use crate::render::{format_timestamp, note_listing_entry, truncate, Reply};

const LIST_FIELDS: &[&str] = &[
    "id",
    "title",
    "parent_id",
    "updated_time",
    "created_time",
    "is_todo",
    "todo_completed",
];

const GET_FIELDS: &[&str] = &[
    "id",
    "title",
    "parent_id",
    "updated_time",
    "created_time",
    "is_todo",
    "todo_completed",
    "source_url",
];

fn clamp_limit(limit: u32) -> usize {
    limit.clamp(1, 100) as usize
}

fn default_list_limit() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

/// Sort order for note listings, passed through to the service.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    UpdatedTime,
    CreatedTime,
    Title,
    Order,
}

impl OrderBy {
    fn as_str(&self) -> &'static str {
        match self {
            OrderBy::UpdatedTime => "updated_time",
            OrderBy::CreatedTime => "created_time",
            OrderBy::Title => "title",
            OrderBy::Order => "order",
        }
    }
}

/// Lists note metadata, optionally scoped to one notebook.
pub struct ListNotes;

#[derive(Debug, Deserialize)]
pub struct ListNotesArgs {
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub order_by: OrderBy,
    #[serde(default = "default_true")]
    pub order_desc: bool,
}

#[async_trait::async_trait]
impl Operation for ListNotes {
    type Args = ListNotesArgs;

    fn name(&self) -> &'static str {
        "joplin_list_notes"
    }

    fn description(&self) -> &'static str {
        "List notes with IDs, titles and dates, newest first by default. Filter by \
         notebook_id, cap with limit. Returns metadata only; use joplin_get_note for the \
         full content."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "notebook_id": {
                    "type": "string",
                    "description": "Only list notes in this notebook. Lists all notes when omitted."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum notes to return (1-100, default 50)"
                },
                "order_by": {
                    "type": "string",
                    "enum": ["updated_time", "created_time", "title", "order"],
                    "description": "Sort field (default updated_time)"
                },
                "order_desc": {
                    "type": "boolean",
                    "description": "Sort descending, newest first (default true)"
                },
                "response_format": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "description": "Reply encoding: human-readable markdown (default) or structured JSON"
                }
            }
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        let limit = clamp_limit(args.limit);

        let endpoint = match &args.notebook_id {
            Some(id) if !id.is_empty() => format!("folders/{}/notes", id),
            _ => "notes".to_string(),
        };

        let filters = vec![
            ("order_by".to_string(), args.order_by.as_str().to_string()),
            (
                "order_dir".to_string(),
                if args.order_desc { "DESC" } else { "ASC" }.to_string(),
            ),
        ];

        // The limit is applied on this side of the merge; taking n items stops
        // the pagination stream early instead of fetching everything.
        let notes: Vec<Note> = client
            .fetch_all(Resource::Notes, &endpoint, filters, LIST_FIELDS)
            .take(limit)
            .try_collect()
            .await?;

        let text = if notes.is_empty() {
            "No notes found.".to_string()
        } else {
            let mut lines = vec![
                "# Notes".to_string(),
                format!("*Showing {} notes*", notes.len()),
                String::new(),
            ];
            lines.extend(notes.iter().map(note_listing_entry));
            truncate(lines.join("\n"), notes.len())
        };

        Ok(Reply::success(json!(notes), text))
    }
}

/// Fetches a single note with its full Markdown body.
pub struct GetNote;

#[derive(Debug, Deserialize)]
pub struct GetNoteArgs {
    pub note_id: String,
    #[serde(default = "default_true")]
    pub include_body: bool,
}

#[async_trait::async_trait]
impl Operation for GetNote {
    type Args = GetNoteArgs;

    fn name(&self) -> &'static str {
        "joplin_get_note"
    }

    fn description(&self) -> &'static str {
        "Get one note by ID, including its full Markdown content and metadata. Use after \
         joplin_list_notes or joplin_search_notes; set include_body=false for metadata only."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": {
                    "type": "string",
                    "description": "The note ID"
                },
                "include_body": {
                    "type": "boolean",
                    "description": "Include the note content (default true)"
                },
                "response_format": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "description": "Reply encoding: human-readable markdown (default) or structured JSON"
                }
            },
            "required": ["note_id"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        if args.note_id.is_empty() {
            return Err(GatewayError::Validation(
                "note_id must not be empty".to_string(),
            ));
        }

        let mut fields: Vec<&str> = GET_FIELDS.to_vec();
        if args.include_body {
            fields.push("body");
        }

        let note: Note = client.get(Resource::Notes, &args.note_id, &fields).await?;

        let mut lines = vec![format!("# {}", note.title), String::new()];
        if note.is_todo_item() {
            let status = if note.is_completed() {
                "Completed"
            } else {
                "Pending"
            };
            lines.push(format!("**Status**: {}", status));
        }
        lines.push(format!("- **ID**: `{}`", note.id));
        lines.push(format!("- **Notebook**: `{}`", note.parent_id));
        lines.push(format!(
            "- **Created**: {}",
            format_timestamp(note.created_time)
        ));
        lines.push(format!(
            "- **Updated**: {}",
            format_timestamp(note.updated_time)
        ));
        if let Some(url) = note.source_url.as_deref().filter(|u| !u.is_empty()) {
            lines.push(format!("- **Source**: {}", url));
        }
        if let Some(body) = note.body.as_deref().filter(|b| !b.is_empty()) {
            lines.push(String::new());
            lines.push("---".to_string());
            lines.push(String::new());
            lines.push(body.to_string());
        }

        let text = truncate(lines.join("\n"), 1);
        Ok(Reply::success(json!(note), text))
    }
}

/// Creates a note. Unlike notebooks there is no duplicate check: repeated
/// calls create repeated notes, which is the documented behavior.
#[derive(Default)]
pub struct CreateNote {
    pub fold: TitleFold,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteArgs {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_todo: bool,
}

#[async_trait::async_trait]
impl Operation for CreateNote {
    type Args = CreateNoteArgs;

    fn name(&self) -> &'static str {
        "joplin_create_note"
    }

    fn description(&self) -> &'static str {
        "Create a note with a Markdown body, optionally as a to-do, in a specific notebook, \
         with tags applied (tags are created on demand). Each call creates a new note."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Note title"
                },
                "body": {
                    "type": "string",
                    "description": "Note content in Markdown (default empty)"
                },
                "notebook_id": {
                    "type": "string",
                    "description": "Target notebook ID. The service's default notebook is used when omitted."
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Tag names to apply; missing tags are created"
                },
                "is_todo": {
                    "type": "boolean",
                    "description": "Create as a to-do item instead of a plain note (default false)"
                }
            },
            "required": ["title"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        let title = args.title.trim();
        if title.is_empty() {
            return Err(GatewayError::Validation(
                "note title must not be empty".to_string(),
            ));
        }

        let mut body = json!({ "title": title, "body": args.body });
        if let Some(id) = args.notebook_id.as_deref().filter(|id| !id.is_empty()) {
            body["parent_id"] = json!(id);
        }
        if args.is_todo {
            body["is_todo"] = json!(1);
        }

        let note: Note = client.create(Resource::Notes, "notes", &body).await?;

        // Tagging is best-effort: a failed tag should not lose the note that
        // was already created.
        let mut applied = Vec::new();
        for name in args.tags.iter().flatten() {
            match tags::resolve_or_create(client, self.fold, name).await {
                Ok(tag) => {
                    match client
                        .post_relation(
                            Resource::Tags,
                            &format!("tags/{}/notes", tag.id),
                            &json!({ "id": note.id }),
                        )
                        .await
                    {
                        Ok(()) => applied.push(tag.title),
                        Err(e) => log::warn!("failed to attach tag '{}': {}", name, e),
                    }
                }
                Err(e) => log::warn!("failed to resolve tag '{}': {}", name, e),
            }
        }

        let kind = if args.is_todo { "to-do" } else { "note" };
        let mut text = format!("Created {} **{}** (ID: `{}`)", kind, note.title, note.id);
        if !applied.is_empty() {
            text.push_str(&format!("\nTags: {}", applied.join(", ")));
        }

        Ok(Reply::success(json!({ "note": note, "tags": applied }), text))
    }
}

/// Partially updates a note: only the provided fields change.
pub struct UpdateNote;

#[derive(Debug, Deserialize)]
pub struct UpdateNoteArgs {
    pub note_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default)]
    pub is_todo: Option<bool>,
    #[serde(default)]
    pub todo_completed: Option<bool>,
}

/// Build the partial-update body. The service stores `todo_completed` as the
/// completion time in Unix ms, so `true` becomes "now" and `false` becomes 0.
fn update_body(args: &UpdateNoteArgs, now_ms: i64) -> Result<serde_json::Value, GatewayError> {
    let mut map = serde_json::Map::new();

    if let Some(title) = &args.title {
        map.insert("title".to_string(), json!(title));
    }
    if let Some(body) = &args.body {
        map.insert("body".to_string(), json!(body));
    }
    if let Some(id) = &args.notebook_id {
        map.insert("parent_id".to_string(), json!(id));
    }
    if let Some(is_todo) = args.is_todo {
        map.insert("is_todo".to_string(), json!(if is_todo { 1 } else { 0 }));
    }
    if let Some(done) = args.todo_completed {
        map.insert(
            "todo_completed".to_string(),
            json!(if done { now_ms } else { 0 }),
        );
    }

    if map.is_empty() {
        return Err(GatewayError::Validation(
            "no fields to update; provide at least one change".to_string(),
        ));
    }

    Ok(serde_json::Value::Object(map))
}

#[async_trait::async_trait]
impl Operation for UpdateNote {
    type Args = UpdateNoteArgs;

    fn name(&self) -> &'static str {
        "joplin_update_note"
    }

    fn description(&self) -> &'static str {
        "Update a note's title, body or notebook, convert it to/from a to-do, or mark a \
         to-do complete. Partial: only the provided fields change."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": {
                    "type": "string",
                    "description": "The note ID to update"
                },
                "title": { "type": "string", "description": "New title" },
                "body": { "type": "string", "description": "New Markdown content" },
                "notebook_id": {
                    "type": "string",
                    "description": "Move the note to this notebook"
                },
                "is_todo": {
                    "type": "boolean",
                    "description": "Convert to (true) or from (false) a to-do item"
                },
                "todo_completed": {
                    "type": "boolean",
                    "description": "Mark the to-do completed (true) or pending (false)"
                }
            },
            "required": ["note_id"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        if args.note_id.is_empty() {
            return Err(GatewayError::Validation(
                "note_id must not be empty".to_string(),
            ));
        }

        let body = update_body(&args, Utc::now().timestamp_millis())?;
        let note: Note = client.update(Resource::Notes, &args.note_id, &body).await?;

        let title = args.title.as_deref().unwrap_or(&note.title);
        Ok(Reply::success(
            json!(note),
            format!("Updated note **{}** (ID: `{}`)", title, args.note_id),
        ))
    }
}

/// Deletes a note. Deleting an already-deleted note reports success: the
/// caller wanted the note gone, and it is.
pub struct DeleteNote;

#[derive(Debug, Deserialize)]
pub struct DeleteNoteArgs {
    pub note_id: String,
}

#[async_trait::async_trait]
impl Operation for DeleteNote {
    type Args = DeleteNoteArgs;

    fn name(&self) -> &'static str {
        "joplin_delete_note"
    }

    fn description(&self) -> &'static str {
        "Delete a note permanently by ID. Cannot be undone. Reports success if the note \
         was already gone."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": {
                    "type": "string",
                    "description": "The note ID to delete"
                }
            },
            "required": ["note_id"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        if args.note_id.is_empty() {
            return Err(GatewayError::Validation(
                "note_id must not be empty".to_string(),
            ));
        }

        match client.delete(Resource::Notes, &args.note_id).await {
            Ok(()) => Ok(Reply::success(
                json!({ "deleted": true, "id": args.note_id }),
                format!("Deleted note (ID: `{}`)", args.note_id),
            )),
            Err(GatewayError::NotFound(_)) => {
                log::info!("note {} was already deleted", args.note_id);
                Ok(Reply::success(
                    json!({ "deleted": true, "id": args.note_id, "already_deleted": true }),
                    format!("Note `{}` was already deleted.", args.note_id),
                ))
            }
            Err(e) => Err(e),
        }
    }
}

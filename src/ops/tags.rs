use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use super::{Operation, TitleFold};
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::joplin::JoplinClient;
use crate::models::Tag;
use crate::render::Reply;

const LIST_FIELDS: &[&str] = &["id", "title"];

/// Find a tag by title, creating it when absent. The same normalization
/// policy as notebook duplicate checks applies, so repeated calls converge on
/// one tag instead of minting near-duplicates.
pub(crate) async fn resolve_or_create(
    client: &JoplinClient,
    fold: TitleFold,
    name: &str,
) -> Result<Tag, GatewayError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GatewayError::Validation(
            "tag name must not be empty".to_string(),
        ));
    }

    let filters = vec![
        ("query".to_string(), name.to_string()),
        ("type".to_string(), "tag".to_string()),
    ];
    let candidates: Vec<Tag> = client
        .fetch_all(Resource::Search, "search", filters, &[])
        .try_collect()
        .await?;

    if let Some(tag) = candidates.into_iter().find(|t| fold.matches(&t.title, name)) {
        return Ok(tag);
    }

    let tag: Tag = client
        .create(Resource::Tags, "tags", &json!({ "title": name }))
        .await?;
    log::info!("created tag '{}' ({})", tag.title, tag.id);
    Ok(tag)
}

/// Lists every tag.
pub struct ListTags;

#[derive(Debug, Deserialize)]
pub struct ListTagsArgs {}

#[async_trait::async_trait]
impl Operation for ListTags {
    type Args = ListTagsArgs;

    fn name(&self) -> &'static str {
        "joplin_list_tags"
    }

    fn description(&self) -> &'static str {
        "List all tags with their IDs. Useful before tag: searches or joplin_tag_note calls; \
         tags are shared across notes."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "response_format": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "description": "Reply encoding: human-readable markdown (default) or structured JSON"
                }
            }
        })
    }

    async fn run(&self, client: &JoplinClient, _args: Self::Args) -> Result<Reply, GatewayError> {
        let tags: Vec<Tag> = client
            .fetch_all(Resource::Tags, "tags", vec![], LIST_FIELDS)
            .try_collect()
            .await?;

        let text = if tags.is_empty() {
            "No tags found.".to_string()
        } else {
            // Alphabetical in the listing; the structured form keeps the
            // service's order.
            let mut sorted: Vec<&Tag> = tags.iter().collect();
            sorted.sort_by_key(|t| t.title.to_lowercase());

            let mut lines = vec!["# Tags".to_string(), String::new()];
            lines.extend(
                sorted
                    .iter()
                    .map(|t| format!("- **{}** (ID: `{}`)", t.title, t.id)),
            );
            lines.join("\n")
        };

        Ok(Reply::success(json!(tags), text))
    }
}

/// Attaches a tag to a note, resolving or creating the tag first when it is
/// given by title.
#[derive(Default)]
pub struct TagNote {
    pub fold: TitleFold,
}

#[derive(Debug, Deserialize)]
pub struct TagNoteArgs {
    pub note_id: String,
    #[serde(default)]
    pub tag_id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[async_trait::async_trait]
impl Operation for TagNote {
    type Args = TagNoteArgs;

    fn name(&self) -> &'static str {
        "joplin_tag_note"
    }

    fn description(&self) -> &'static str {
        "Add a tag to a note, by tag_id or by tag name. A named tag is created when it \
         does not exist yet (case-insensitive match). Safe to repeat."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": {
                    "type": "string",
                    "description": "The note ID to tag"
                },
                "tag_id": {
                    "type": "string",
                    "description": "ID of an existing tag"
                },
                "tag": {
                    "type": "string",
                    "description": "Tag name; created when no tag with this title exists"
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

        let tag = match args.tag_id.as_deref().filter(|id| !id.is_empty()) {
            // An explicit id is looked up rather than trusted, so a stale id
            // surfaces as NotFound instead of a dangling association.
            Some(id) => client.get::<Tag>(Resource::Tags, id, LIST_FIELDS).await?,
            None => match args.tag.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(name) => resolve_or_create(client, self.fold, name).await?,
                None => {
                    return Err(GatewayError::Validation(
                        "provide either tag_id or tag".to_string(),
                    ))
                }
            },
        };

        client
            .post_relation(
                Resource::Tags,
                &format!("tags/{}/notes", tag.id),
                &json!({ "id": args.note_id }),
            )
            .await?;

        Ok(Reply::success(
            json!({ "note_id": args.note_id, "tag": tag }),
            format!("Added tag **{}** to note `{}`", tag.title, args.note_id),
        ))
    }
}

use serde::Deserialize;
use serde_json::json;

use super::{Operation, TitleFold};
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::joplin::JoplinClient;
use crate::models::Notebook;
use crate::render::Reply;
use futures_util::TryStreamExt;

const LIST_FIELDS: &[&str] = &["id", "title", "parent_id"];

/// Lists every notebook, rendered as a nested tree.
pub struct ListNotebooks;

#[derive(Debug, Deserialize)]
pub struct ListNotebooksArgs {}

#[async_trait::async_trait]
impl Operation for ListNotebooks {
    type Args = ListNotebooksArgs;

    fn name(&self) -> &'static str {
        "joplin_list_notebooks"
    }

    fn description(&self) -> &'static str {
        "List notebooks with IDs and hierarchy. Use this to find a notebook_id before \
         filtering notes or creating new ones; the markdown form shows the parent/child tree."
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
        let notebooks: Vec<Notebook> = client
            .fetch_all(Resource::Notebooks, "folders", vec![], LIST_FIELDS)
            .try_collect()
            .await?;

        let text = if notebooks.is_empty() {
            "No notebooks found.".to_string()
        } else {
            let mut lines = vec!["# Notebooks".to_string(), String::new()];
            tree_lines(&notebooks, "", 0, &mut lines);
            lines.join("\n")
        };

        Ok(Reply::success(json!(notebooks), text))
    }
}

/// Render notebooks as an indented tree, children under their parents.
fn tree_lines(notebooks: &[Notebook], parent: &str, depth: usize, lines: &mut Vec<String>) {
    for nb in notebooks.iter().filter(|nb| nb.parent_id == parent) {
        let indent = "  ".repeat(depth);
        lines.push(format!("{}- **{}**", indent, nb.title));
        lines.push(format!("{}  ID: `{}`", indent, nb.id));
        tree_lines(notebooks, &nb.id, depth + 1, lines);
    }
}

/// Creates a notebook unless one with the same title already exists at the
/// same level, in which case the existing notebook is returned unchanged.
/// Repeated calls with the same title never create duplicates; the service
/// itself does not enforce title uniqueness, so the check lives here.
#[derive(Default)]
pub struct CreateNotebook {
    pub fold: TitleFold,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotebookArgs {
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[async_trait::async_trait]
impl Operation for CreateNotebook {
    type Args = CreateNotebookArgs;

    fn name(&self) -> &'static str {
        "joplin_create_notebook"
    }

    fn description(&self) -> &'static str {
        "Create a notebook, or return the existing one when a notebook with the same title \
         already exists at the same level (case-insensitive). Safe to repeat; never creates \
         duplicates."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Notebook title"
                },
                "parent_id": {
                    "type": "string",
                    "description": "Parent notebook ID, for creating a sub-notebook"
                }
            },
            "required": ["title"]
        })
    }

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError> {
        let title = args.title.trim();
        if title.is_empty() {
            return Err(GatewayError::Validation(
                "notebook title must not be empty".to_string(),
            ));
        }

        let existing: Vec<Notebook> = client
            .fetch_all(Resource::Notebooks, "folders", vec![], LIST_FIELDS)
            .try_collect()
            .await?;

        // Duplicate check is scoped to the same parent level: "Work" under
        // two different parents is two different notebooks.
        let parent = args.parent_id.clone().unwrap_or_default();
        if let Some(nb) = existing
            .iter()
            .find(|nb| nb.parent_id == parent && self.fold.matches(&nb.title, title))
        {
            log::info!("notebook '{}' already exists as {}", nb.title, nb.id);
            return Ok(Reply::success(
                json!({ "notebook": nb, "created": false }),
                format!(
                    "Notebook **{}** already exists (ID: `{}`). Using the existing notebook.",
                    nb.title, nb.id
                ),
            ));
        }

        let mut body = json!({ "title": title });
        if !parent.is_empty() {
            body["parent_id"] = json!(parent);
        }

        let notebook: Notebook = client.create(Resource::Notebooks, "folders", &body).await?;

        Ok(Reply::success(
            json!({ "notebook": notebook, "created": true }),
            format!(
                "Created notebook **{}** (ID: `{}`)",
                notebook.title, notebook.id
            ),
        ))
    }
}

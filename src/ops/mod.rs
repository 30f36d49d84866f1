pub mod notebooks;
pub mod notes;
pub mod search;
pub mod system;
pub mod tags;

use serde::de::DeserializeOwned;

use crate::error::GatewayError;
use crate::joplin::JoplinClient;
use crate::render::Reply;

/// Agent-facing operation: a pure transformation of validated arguments into
/// gateway calls plus a rendering step.
///
/// Not object-safe (associated `Args`) by intent: dispatch calls operations
/// by concrete type, not `dyn Operation`.
#[async_trait::async_trait]
pub trait Operation: Send + Sync {
    type Args: DeserializeOwned + Send;

    fn name(&self) -> &'static str;

    /// Tool description shown to the agent. Front-loaded with the action verb
    /// and outcome so it survives truncated previews.
    fn description(&self) -> &'static str;

    /// JSON Schema for the argument object.
    fn input_schema(&self) -> serde_json::Value;

    async fn run(&self, client: &JoplinClient, args: Self::Args) -> Result<Reply, GatewayError>;
}

/// Title matching policy for duplicate checks (notebooks, tags).
///
/// The normalization is a policy value rather than hard-coded casing; the
/// default folds case and surrounding whitespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TitleFold {
    #[default]
    CaseInsensitive,
    Exact,
}

impl TitleFold {
    fn key(&self, title: &str) -> String {
        match self {
            TitleFold::CaseInsensitive => title.trim().to_lowercase(),
            TitleFold::Exact => title.to_string(),
        }
    }

    pub fn matches(&self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }
}

/// Catalogue entry for tool registration.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

fn spec_of<O: Operation>(op: &O) -> ToolSpec {
    ToolSpec {
        name: op.name(),
        description: op.description(),
        input_schema: op.input_schema(),
    }
}

/// Every supported operation, in the order they are advertised.
pub fn catalogue() -> Vec<ToolSpec> {
    vec![
        spec_of(&system::EnsureRunning),
        spec_of(&notebooks::ListNotebooks),
        spec_of(&notebooks::CreateNotebook::default()),
        spec_of(&notes::ListNotes),
        spec_of(&notes::GetNote),
        spec_of(&notes::CreateNote::default()),
        spec_of(&notes::UpdateNote),
        spec_of(&notes::DeleteNote),
        spec_of(&search::SearchNotes),
        spec_of(&tags::ListTags),
        spec_of(&tags::TagNote::default()),
    ]
}

/// Resolve one tool call. This is the error boundary: argument problems and
/// gateway failures all come back as structured failure replies, never as an
/// `Err` the transport would have to interpret.
pub async fn dispatch(client: &JoplinClient, name: &str, args: serde_json::Value) -> Reply {
    match name {
        "joplin_ensure_running" => call(system::EnsureRunning, client, args).await,
        "joplin_list_notebooks" => call(notebooks::ListNotebooks, client, args).await,
        "joplin_create_notebook" => call(notebooks::CreateNotebook::default(), client, args).await,
        "joplin_list_notes" => call(notes::ListNotes, client, args).await,
        "joplin_get_note" => call(notes::GetNote, client, args).await,
        "joplin_create_note" => call(notes::CreateNote::default(), client, args).await,
        "joplin_update_note" => call(notes::UpdateNote, client, args).await,
        "joplin_delete_note" => call(notes::DeleteNote, client, args).await,
        "joplin_search_notes" => call(search::SearchNotes, client, args).await,
        "joplin_list_tags" => call(tags::ListTags, client, args).await,
        "joplin_tag_note" => call(tags::TagNote::default(), client, args).await,
        _ => Reply::failure(
            "validation_error",
            format!("unknown operation: {}", name),
        ),
    }
}

async fn call<O: Operation>(op: O, client: &JoplinClient, raw: serde_json::Value) -> Reply {
    let args: O::Args = match serde_json::from_value(raw) {
        Ok(args) => args,
        Err(e) => {
            return Reply::failure(
                "validation_error",
                format!("invalid arguments for {}: {}", op.name(), e),
            )
        }
    };

    match op.run(client, args).await {
        Ok(reply) => reply,
        Err(e) => {
            log::warn!("{} failed: {}", op.name(), e);
            Reply::failure(e.kind(), e.to_string())
        }
    }
}

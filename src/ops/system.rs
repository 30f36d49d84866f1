use serde::Deserialize;
use serde_json::json;

use super::Operation;
use crate::error::GatewayError;
use crate::fields::Resource;
use crate::joplin::JoplinClient;
use crate::models::Notebook;
use crate::render::Reply;

/// Availability probe: one cheap notebook-page fetch. Pre-warms the
/// connection and tells the agent whether the service is reachable before it
/// commits to a batch of calls. Never launches anything and never returns an
/// entity.
pub struct EnsureRunning;

#[derive(Debug, Deserialize)]
pub struct EnsureRunningArgs {}

#[async_trait::async_trait]
impl Operation for EnsureRunning {
    type Args = EnsureRunningArgs;

    fn name(&self) -> &'static str {
        "joplin_ensure_running"
    }

    fn description(&self) -> &'static str {
        "Check that the note service API is reachable and the token works. Use before \
         batch operations to avoid cold-start surprises; reports availability only."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn run(&self, client: &JoplinClient, _args: Self::Args) -> Result<Reply, GatewayError> {
        match client
            .fetch_page::<Notebook>(Resource::Notebooks, "folders", &[], &["id"], 1, 1)
            .await
        {
            Ok(_) => Ok(Reply::success(
                json!({ "available": true }),
                "Joplin is running and the API is reachable.".to_string(),
            )),
            // Unreachable is the answer, not a failure of the probe itself.
            Err(GatewayError::Transport(detail)) => Ok(Reply::success(
                json!({ "available": false, "detail": detail }),
                "Joplin is not reachable. Start the desktop app and enable the Web Clipper \
                 service (Tools > Options > Web Clipper), then try again."
                    .to_string(),
            )),
            Err(e) => Err(e),
        }
    }
}

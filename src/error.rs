use thiserror::Error;

use crate::fields::Resource;

/// Failure taxonomy for everything that can go wrong between an agent tool
/// call and the Joplin Data API.
///
/// Every operation surfaces exactly one of these. The resolver boundary turns
/// them into structured failure replies; nothing here ever escapes as a
/// process crash.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Joplin is unreachable or the request timed out. The dominant failure
    /// mode: Joplin is a desktop app the user must have open.
    #[error(
        "cannot connect to Joplin: {0}. Make sure Joplin is running, the Web Clipper \
         service is enabled (Tools > Options > Web Clipper), and JOPLIN_PORT matches \
         the configured API port"
    )]
    Transport(String),

    /// 401/403 from the service.
    #[error("Joplin rejected the API token. Check that JOPLIN_TOKEN matches the token \
             shown under Tools > Options > Web Clipper")]
    Auth,

    /// A field selection outside the recognized contract for a resource.
    /// Requesting such a field live triggers a service-side 500, so this is
    /// caught locally before any request is issued.
    #[error("unrecognized field for {resource}: {detail}")]
    Schema {
        resource: &'static str,
        detail: String,
    },

    /// Malformed caller input, rejected locally or by the service (400).
    #[error("invalid request: {0}")]
    Validation(String),

    /// The referenced entity does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The pagination loop hit the hard page ceiling without the service ever
    /// reporting completion.
    #[error("pagination did not complete within {0} pages; aborting instead of looping")]
    PaginationLimit(u32),

    /// Any other non-2xx status, or a response body that could not be parsed.
    #[error("Joplin API error: {0}")]
    Upstream(String),
}

impl GatewayError {
    /// Stable machine-readable kind, used in structured failure replies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport_error",
            GatewayError::Auth => "auth_error",
            GatewayError::Schema { .. } => "schema_error",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::NotFound(_) => "not_found_error",
            GatewayError::PaginationLimit(_) => "pagination_limit_error",
            GatewayError::Upstream(_) => "upstream_error",
        }
    }

    /// Classify a non-2xx response from the service.
    ///
    /// A 500 whose body names an unrecognized column is the field-contract
    /// defect, not a generic upstream failure; Joplin reports it as a SQL
    /// error rather than a 400.
    pub fn from_status(resource: Resource, status: u16, body: &str) -> Self {
        match status {
            401 | 403 => GatewayError::Auth,
            404 => GatewayError::NotFound(format!("{} resource", resource.label())),
            400 => GatewayError::Validation(truncate_body(body)),
            500 if is_unknown_field_body(body) => GatewayError::Schema {
                resource: resource.label(),
                detail: truncate_body(body),
            },
            _ => GatewayError::Upstream(format!("({}): {}", status, truncate_body(body))),
        }
    }

    /// Classify a transport-level failure from reqwest.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            GatewayError::Transport(err.to_string())
        } else {
            GatewayError::Upstream(err.to_string())
        }
    }
}

fn is_unknown_field_body(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("no such column") || body.contains("unknown field")
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() > MAX {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

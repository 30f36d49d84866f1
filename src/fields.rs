use crate::error::GatewayError;

/// Resources exposed by the Joplin Data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Notes,
    Notebooks,
    Tags,
    Search,
}

/// Fields the note storage schema actually defines, per resource.
///
/// This list is a fixed contract with the service, not documentation-derived:
/// requesting a field outside it makes Joplin fail the whole request with a
/// 500, so selections are checked here before any HTTP call goes out.
const NOTE_FIELDS: &[&str] = &[
    "id",
    "title",
    "body",
    "parent_id",
    "is_todo",
    "todo_completed",
    "created_time",
    "updated_time",
    "source_url",
];

const NOTEBOOK_FIELDS: &[&str] = &["id", "title", "parent_id", "created_time", "updated_time"];

const TAG_FIELDS: &[&str] = &["id", "title"];

impl Resource {
    /// URL path segment on the Data API.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Notes => "notes",
            Resource::Notebooks => "folders",
            Resource::Tags => "tags",
            Resource::Search => "search",
        }
    }

    /// Human-facing name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Resource::Notes => "notes",
            Resource::Notebooks => "notebooks",
            Resource::Tags => "tags",
            Resource::Search => "search",
        }
    }

    /// The recognized-field contract for this resource. Search results are
    /// notes, so search shares the note contract.
    pub fn allowed_fields(&self) -> &'static [&'static str] {
        match self {
            Resource::Notes | Resource::Search => NOTE_FIELDS,
            Resource::Notebooks => NOTEBOOK_FIELDS,
            Resource::Tags => TAG_FIELDS,
        }
    }

    /// Reject any selection outside the contract. Violations are caller
    /// programming errors and must never reach the service.
    pub fn check_fields(&self, fields: &[&str]) -> Result<(), GatewayError> {
        for field in fields {
            if !self.allowed_fields().contains(field) {
                return Err(GatewayError::Schema {
                    resource: self.label(),
                    detail: format!("'{}' is not a recognized field", field),
                });
            }
        }
        Ok(())
    }
}

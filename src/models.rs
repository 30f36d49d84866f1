use serde::{Deserialize, Serialize};

/// A note as returned by the Data API. Joplin uses string UUIDs and encodes
/// the to-do flags as integers: `is_todo` is 0/1, `todo_completed` is 0 or
/// the completion time in Unix ms.
///
/// Fields the caller did not select are absent from the response, so
/// everything except `id` is defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub is_todo: i64,
    #[serde(default)]
    pub todo_completed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Note {
    pub fn is_todo_item(&self) -> bool {
        self.is_todo != 0
    }

    pub fn is_completed(&self) -> bool {
        self.todo_completed != 0
    }
}

/// A notebook (a `folder` on the wire). `parent_id` is an empty string for
/// top-level notebooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_id: String,
}

impl Notebook {
    pub fn parent(&self) -> Option<&str> {
        if self.parent_id.is_empty() {
            None
        } else {
            Some(&self.parent_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// One HTTP response unit of a paginated listing. Pages only exist inside the
/// merge loop; callers see the merged item stream.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

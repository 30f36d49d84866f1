//! Operation-level tests: business rules end-to-end against a mock Joplin,
//! entered through the same dispatch path the MCP transport uses.

use std::time::Duration;

use joplin_mcp::joplin::JoplinClient;
use joplin_mcp::ops;
use joplin_mcp::render::Reply;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> JoplinClient {
    JoplinClient::new(server.uri(), "test-token", Duration::from_secs(2))
}

async fn dispatch(server: &MockServer, name: &str, args: serde_json::Value) -> Reply {
    ops::dispatch(&client_for(server), name, args).await
}

// ────────────────────────────────────────────────────────────────────────────
// Notebook idempotency
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_notebook_returns_existing_on_case_insensitive_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "nb1", "title": "Work", "parent_id": "" }],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The whole point: no POST happens when a match exists
    Mock::given(method("POST"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_create_notebook", json!({ "title": "WORK" })).await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["created"], false);
    assert_eq!(reply.structured["notebook"]["id"], "nb1");
    assert!(reply.text.contains("already exists"));
}

#[tokio::test]
async fn test_create_notebook_ignores_surrounding_whitespace() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "nb1", "title": "Work", "parent_id": "" }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_create_notebook", json!({ "title": "  work  " })).await;
    assert_eq!(reply.structured["notebook"]["id"], "nb1");
}

#[tokio::test]
async fn test_create_notebook_creates_when_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_partial_json(json!({ "title": "Reading" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "nb2", "title": "Reading", "parent_id": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_create_notebook", json!({ "title": "Reading" })).await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["created"], true);
    assert_eq!(reply.structured["notebook"]["id"], "nb2");
}

#[tokio::test]
async fn test_create_notebook_duplicate_check_is_scoped_to_parent_level() {
    let server = MockServer::start().await;

    // "Work" exists at top level; creating "Work" under p1 is a new notebook
    Mock::given(method("GET"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "nb1", "title": "Work", "parent_id": "" }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_partial_json(json!({ "title": "Work", "parent_id": "p1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "nb3", "title": "Work", "parent_id": "p1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_create_notebook",
        json!({ "title": "Work", "parent_id": "p1" }),
    )
    .await;

    assert_eq!(reply.structured["created"], true);
}

// ────────────────────────────────────────────────────────────────────────────
// Note lifecycle
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_note_missing_surfaces_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notes/missing-id"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_get_note", json!({ "note_id": "missing-id" })).await;

    assert!(reply.is_error);
    assert_eq!(reply.structured["error"]["kind"], "not_found_error");
}

#[tokio::test]
async fn test_delete_note_missing_is_success_equivalent() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/notes/missing-id"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_delete_note", json!({ "note_id": "missing-id" })).await;

    // Deletion achieved by definition: not an error for the caller
    assert!(!reply.is_error);
    assert_eq!(reply.structured["deleted"], true);
    assert_eq!(reply.structured["already_deleted"], true);
}

#[tokio::test]
async fn test_delete_note_success() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/notes/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_delete_note", json!({ "note_id": "n1" })).await;
    assert!(!reply.is_error);
    assert!(reply.structured.get("already_deleted").is_none());
}

#[tokio::test]
async fn test_update_note_sends_only_provided_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/notes/n1"))
        .and(body_partial_json(json!({ "title": "Renamed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n1", "title": "Renamed", "parent_id": "nb1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_update_note",
        json!({ "note_id": "n1", "title": "Renamed" }),
    )
    .await;

    assert!(!reply.is_error);
    assert!(reply.text.contains("Renamed"));
}

#[tokio::test]
async fn test_update_note_with_no_changes_fails_locally() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_update_note", json!({ "note_id": "n1" })).await;

    assert!(reply.is_error);
    assert_eq!(reply.structured["error"]["kind"], "validation_error");
}

#[tokio::test]
async fn test_create_note_applies_tags_best_effort() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(body_partial_json(json!({ "title": "Standup", "is_todo": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n9", "title": "Standup", "parent_id": "nb1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Tag already exists under a different casing
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "tag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "t1", "title": "Work" }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tags/t1/notes"))
        .and(body_partial_json(json!({ "id": "n9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_create_note",
        json!({ "title": "Standup", "is_todo": true, "tags": ["work"] }),
    )
    .await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["note"]["id"], "n9");
    assert_eq!(reply.structured["tags"][0], "Work");
}

#[tokio::test]
async fn test_list_notes_applies_limit_after_merge() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/folders/nb1/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "n1", "title": "a" },
                { "id": "n2", "title": "b" },
                { "id": "n3", "title": "c" }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_list_notes",
        json!({ "notebook_id": "nb1", "limit": 2 }),
    )
    .await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured.as_array().unwrap().len(), 2);
    assert!(reply.text.contains("Showing 2 notes"));
}

// ────────────────────────────────────────────────────────────────────────────
// Search passthrough
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_query_passes_through_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "tag:work type:todo iscompleted:0"))
        .and(query_param("type", "note"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "n1", "title": "Standup", "is_todo": 1, "todo_completed": 0 }],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_search_notes",
        json!({ "query": "tag:work type:todo iscompleted:0" }),
    )
    .await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["notes"][0]["id"], "n1");
    assert!(reply.text.contains("[ ] Standup"));
}

// ────────────────────────────────────────────────────────────────────────────
// Tagging
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tag_note_creates_missing_tag_then_associates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "urgent"))
        .and(query_param("type", "tag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tags"))
        .and(body_partial_json(json!({ "title": "urgent" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "title": "urgent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tags/t1/notes"))
        .and(body_partial_json(json!({ "id": "note-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_tag_note",
        json!({ "note_id": "note-1", "tag": "urgent" }),
    )
    .await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["tag"]["id"], "t1");
}

#[tokio::test]
async fn test_tag_note_reuses_existing_tag_case_insensitively() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "tag"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "t1", "title": "Urgent" }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    // Second identical call must reuse t1, not mint a duplicate
    Mock::given(method("POST"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/tags/t1/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(
        &server,
        "joplin_tag_note",
        json!({ "note_id": "note-1", "tag": "urgent" }),
    )
    .await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["tag"]["id"], "t1");
}

#[tokio::test]
async fn test_tag_note_requires_a_tag_reference() {
    let server = MockServer::start().await;

    let reply = dispatch(&server, "joplin_tag_note", json!({ "note_id": "n1" })).await;

    assert!(reply.is_error);
    assert_eq!(reply.structured["error"]["kind"], "validation_error");
}

// ────────────────────────────────────────────────────────────────────────────
// Availability probe
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ensure_running_reports_available() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/folders"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "nb1", "title": "Inbox" }],
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = dispatch(&server, "joplin_ensure_running", json!({})).await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["available"], true);
}

#[tokio::test]
async fn test_ensure_running_reports_unavailable_without_erroring() {
    let client = JoplinClient::new("http://127.0.0.1:9", "test-token", Duration::from_secs(2));

    let reply = ops::dispatch(&client, "joplin_ensure_running", json!({})).await;

    assert!(!reply.is_error);
    assert_eq!(reply.structured["available"], false);
    assert!(reply.text.contains("Web Clipper"));
}

// ────────────────────────────────────────────────────────────────────────────
// Resolver boundary
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_arguments_become_validation_failures() {
    let server = MockServer::start().await;

    // limit must be an integer
    let reply = dispatch(
        &server,
        "joplin_list_notes",
        json!({ "limit": "lots" }),
    )
    .await;

    assert!(reply.is_error);
    assert_eq!(reply.structured["error"]["kind"], "validation_error");
}

#[tokio::test]
async fn test_transport_failures_carry_actionable_guidance() {
    let client = JoplinClient::new("http://127.0.0.1:9", "test-token", Duration::from_secs(2));

    let reply = ops::dispatch(&client, "joplin_list_notebooks", json!({})).await;

    assert!(reply.is_error);
    assert_eq!(reply.structured["error"]["kind"], "transport_error");
    assert!(reply.text.contains("Make sure Joplin is running"));
}

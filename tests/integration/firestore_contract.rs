//! Integration tests for the Firestore REST contract.
//!
//! A wiremock server stands in for the document store. Each test checks the
//! request the gateway sends and how it maps the store's reply:
//! - create goes through `:commit` with a server-stamped `created_at`
//! - list goes through `:runQuery` and skips undecodable documents
//! - missing documents are `None` on get, `NotFound` on update, and a no-op
//!   on delete
//! - service-account mode exchanges a token before calling the store

use serde_json::json;
use tasklist::store::auth::{ServiceAccount, TokenProvider};
use tasklist::store::firestore::Authorization;
use tasklist::store::{FirestoreStore, StoreError, TaskStore};
use tasklist_proto::document::DatabasePath;
use tasklist_proto::task::{NewTask, TaskId};
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCUMENTS: &str = "/v1/projects/demo/databases/(default)/documents";
const TEST_KEY: &str = include_str!("../fixtures/test_service_account_key.pem");

fn emulator_store(server: &MockServer) -> FirestoreStore {
    FirestoreStore::new(
        reqwest::Client::new(),
        &server.uri(),
        DatabasePath::new("demo"),
        "todos",
        Authorization::Emulator,
    )
}

fn stored(id: &str, content: &str, completed: bool, created_at: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/todos/{id}"),
        "fields": {
            "content": { "stringValue": content },
            "completed": { "booleanValue": completed },
            "created_at": { "timestampValue": created_at },
        },
        "createTime": created_at,
        "updateTime": created_at,
    })
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn add_commits_new_document_with_server_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}:commit")))
        .and(header("authorization", "Bearer owner"))
        .and(body_partial_json(json!({
            "writes": [{
                "update": {
                    "fields": {
                        "content": { "stringValue": "  Buy milk " },
                        "completed": { "booleanValue": false },
                    },
                },
                "updateTransforms": [{
                    "fieldPath": "created_at",
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{ "updateTime": "2026-01-02T03:04:05Z" }],
            "commitTime": "2026-01-02T03:04:05Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = emulator_store(&server);
    let id = store
        .add_task(NewTask::new("  Buy milk ").unwrap())
        .await
        .unwrap();
    assert_eq!(id.as_str().len(), 20);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let name = body["writes"][0]["update"]["name"].as_str().unwrap();
    assert_eq!(
        name,
        format!("projects/demo/databases/(default)/documents/todos/{id}")
    );
}

#[tokio::test]
async fn add_failure_carries_store_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}:commit")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED" },
        })))
        .mount(&server)
        .await;

    let err = emulator_store(&server)
        .add_task(NewTask::new("x").unwrap())
        .await
        .unwrap_err();
    match err {
        StoreError::OperationFailed(message) => {
            assert!(message.contains("403"), "{message}");
            assert!(message.contains("Missing or insufficient permissions."), "{message}");
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

// =============================================================================
// List
// =============================================================================

#[tokio::test]
async fn list_runs_descending_query_and_decodes_documents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}:runQuery")))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "todos" }],
                "orderBy": [{ "field": { "fieldPath": "created_at" }, "direction": "DESCENDING" }],
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "document": stored("newer", "Water plants", true, "2026-01-02T10:00:00.000001Z"), "readTime": "2026-01-02T11:00:00Z" },
            { "document": { "name": "projects/demo/databases/(default)/documents/todos/broken", "fields": {} } },
            { "document": stored("older", "Buy milk", false, "2026-01-01T10:00:00Z") },
        ])))
        .mount(&server)
        .await;

    let tasks = emulator_store(&server).list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id.as_str(), "newer");
    assert_eq!(tasks[0].content, "Water plants");
    assert!(tasks[0].completed);
    assert_eq!(tasks[1].id.as_str(), "older");
    assert!(!tasks[1].completed);
    assert!(tasks[0].created_at > tasks[1].created_at);
}

#[tokio::test]
async fn empty_collection_lists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}:runQuery")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "readTime": "2026-01-02T11:00:00Z" }])),
        )
        .mount(&server)
        .await;

    assert!(emulator_store(&server).list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn list_server_error_is_operation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}:runQuery")))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let err = emulator_store(&server).list_tasks().await.unwrap_err();
    assert!(matches!(err, StoreError::OperationFailed(ref m) if m.contains("backend exploded")));
}

// =============================================================================
// Get / update / delete
// =============================================================================

#[tokio::test]
async fn get_decodes_document_and_maps_missing_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/todos/abc")))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored(
            "abc",
            "Buy milk",
            false,
            "2026-01-01T10:00:00Z",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/todos/gone")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" },
        })))
        .mount(&server)
        .await;

    let store = emulator_store(&server);
    let task = store
        .get_task(&TaskId::parse("abc").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.content, "Buy milk");
    assert!(
        store
            .get_task(&TaskId::parse("gone").unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn get_reads_legacy_done_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/todos/old")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/todos/old",
            "fields": {
                "content": { "stringValue": "Legacy" },
                "done": { "booleanValue": true },
            },
            "createTime": "2025-06-01T00:00:00Z",
        })))
        .mount(&server)
        .await;

    let task = emulator_store(&server)
        .get_task(&TaskId::parse("old").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(task.completed);
}

#[tokio::test]
async fn update_patches_only_completed_field() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCUMENTS}/todos/abc")))
        .and(query_param("updateMask.fieldPaths", "completed"))
        .and(query_param("currentDocument.exists", "true"))
        .and(body_partial_json(json!({
            "fields": { "completed": { "booleanValue": true } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored(
            "abc",
            "Buy milk",
            true,
            "2026-01-01T10:00:00Z",
        )))
        .expect(1)
        .mount(&server)
        .await;

    emulator_store(&server)
        .update_task(&TaskId::parse("abc").unwrap(), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn update_of_missing_document_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCUMENTS}/todos/gone")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let id = TaskId::parse("gone").unwrap();
    let err = emulator_store(&server)
        .update_task(&id, true)
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound(id));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{DOCUMENTS}/todos/abc")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{DOCUMENTS}/todos/gone")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = emulator_store(&server);
    store.delete_task(&TaskId::parse("abc").unwrap()).await.unwrap();
    store.delete_task(&TaskId::parse("gone").unwrap()).await.unwrap();
}

#[tokio::test]
async fn unreachable_store_is_operation_failure() {
    let server = MockServer::start().await;
    let store = emulator_store(&server);
    drop(server);

    let err = store.list_tasks().await.unwrap_err();
    assert!(matches!(err, StoreError::OperationFailed(_)));
}

// =============================================================================
// Service-account authorization
// =============================================================================

#[tokio::test]
async fn service_account_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.contract",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":runQuery$"))
        .and(header("authorization", "Bearer ya29.contract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let credential = json!({
        "type": "service_account",
        "project_id": "demo",
        "client_email": "tasks@demo.iam.gserviceaccount.com",
        "private_key": TEST_KEY,
        "token_uri": format!("{}/token", server.uri()),
    })
    .to_string();
    let account = ServiceAccount::from_json(&credential).unwrap();
    let http = reqwest::Client::new();
    let store = FirestoreStore::new(
        http.clone(),
        &server.uri(),
        DatabasePath::new("demo"),
        "todos",
        Authorization::ServiceAccount(TokenProvider::new(account, http)),
    );

    assert!(store.list_tasks().await.unwrap().is_empty());
    assert!(store.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_token_exchange_fails_the_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature.",
        })))
        .mount(&server)
        .await;

    let credential = json!({
        "client_email": "tasks@demo.iam.gserviceaccount.com",
        "private_key": TEST_KEY,
        "token_uri": format!("{}/token", server.uri()),
    })
    .to_string();
    let account = ServiceAccount::from_json(&credential).unwrap();
    let http = reqwest::Client::new();
    let store = FirestoreStore::new(
        http.clone(),
        &server.uri(),
        DatabasePath::new("demo"),
        "todos",
        Authorization::ServiceAccount(TokenProvider::new(account, http)),
    );

    let err = store.list_tasks().await.unwrap_err();
    assert!(matches!(err, StoreError::OperationFailed(ref m) if m.contains("invalid_grant")));
}

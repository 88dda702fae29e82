//! Integration tests for the add / list / toggle / delete / suggest flow.
//!
//! Runs the real server in-process on an OS-assigned port, backed by the
//! in-memory store and a canned tip generator, and drives it over HTTP:
//! - Add followed by List shows exactly one new, incomplete task, first,
//!   with the content exactly as typed
//! - Blank adds leave the collection unchanged
//! - Toggle twice restores the original flag
//! - Delete removes the task; later toggle/suggest treat it as not found

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use tasklist::router::{self, AppState, ErrorBody, SuggestionBody, TaskListBody};
use tasklist::store::{MemoryStore, TaskGateway};
use tasklist::suggest::{SuggestError, SuggestionGateway, TipGenerator};
use tasklist_proto::task::Task;

/// Replies with a fixed tip, after checking the task text reached the prompt.
struct CannedTip;

#[async_trait]
impl TipGenerator for CannedTip {
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError> {
        assert!(prompt.contains("Buy milk"), "prompt should carry the task");
        Ok("Pick some up on the way home.".to_string())
    }
}

/// Test harness: a running server plus a non-redirecting client.
struct Harness {
    base: String,
    client: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        let state = Arc::new(AppState::new(
            TaskGateway::ready(MemoryStore::new()),
            SuggestionGateway::ready(CannedTip),
        ));
        let (addr, handle) = router::start_server("127.0.0.1:0", state)
            .await
            .expect("failed to start server");
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap();
        Self {
            base: format!("http://{addr}"),
            client,
            _handle: handle,
        }
    }

    async fn add(&self, content: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/", self.base))
            .form(&[("content", content)])
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap()
    }

    async fn list(&self) -> Vec<Task> {
        let response = self.get("/api/tasks").await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json::<TaskListBody>().await.unwrap().tasks
    }
}

fn assert_redirect_home(response: &reqwest::Response) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/");
}

#[tokio::test]
async fn buy_milk_scenario() {
    let h = Harness::start().await;

    assert_redirect_home(&h.add("Buy milk").await);
    let tasks = h.list().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].content, "Buy milk");
    assert!(!tasks[0].completed);
    let id = tasks[0].id.clone();

    assert_redirect_home(&h.get(&format!("/toggle/{id}")).await);
    let tasks = h.list().await;
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].completed);

    assert_redirect_home(&h.get(&format!("/delete/{id}")).await);
    assert!(h.list().await.is_empty());
}

#[tokio::test]
async fn content_is_listed_exactly_as_sent() {
    let h = Harness::start().await;
    let long = "x".repeat(600);

    for content in ["  Buy milk  ", long.as_str()] {
        let response = h.add(content).await;
        assert_redirect_home(&response);
        assert!(response.headers().get("set-cookie").is_none());
    }

    let contents: Vec<String> = h.list().await.into_iter().map(|t| t.content).collect();
    assert_eq!(contents, [long, "  Buy milk  ".to_string()]);
}

#[tokio::test]
async fn new_tasks_are_listed_first() {
    let h = Harness::start().await;
    for content in ["first", "second", "third"] {
        h.add(content).await;
    }
    let before = h.list().await;

    h.add("newest").await;
    let after = h.list().await;

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[0].content, "newest");
    assert!(!after[0].completed);
    assert_eq!(&after[1..], &before[..]);
    assert_eq!(after.iter().filter(|t| t.content == "newest").count(), 1);
}

#[tokio::test]
async fn blank_content_changes_nothing() {
    let h = Harness::start().await;
    h.add("keep").await;
    let before = h.list().await;

    for blank in ["", "   ", "\t\n"] {
        let response = h.add(blank).await;
        assert_redirect_home(&response);
        assert!(response.headers().get("set-cookie").is_none());
    }

    assert_eq!(h.list().await, before);
}

#[tokio::test]
async fn toggle_twice_restores_original_value() {
    let h = Harness::start().await;
    h.add("Water plants").await;
    let id = h.list().await[0].id.clone();

    h.get(&format!("/toggle/{id}")).await;
    h.get(&format!("/toggle/{id}")).await;

    assert!(!h.list().await[0].completed);
}

#[tokio::test]
async fn deleted_task_behaves_as_not_found() {
    let h = Harness::start().await;
    h.add("Buy milk").await;
    h.add("Other").await;
    let tasks = h.list().await;
    let target = tasks
        .iter()
        .find(|t| t.content == "Buy milk")
        .unwrap()
        .id
        .clone();

    let response = h
        .client
        .post(format!("{}/delete/{target}", h.base))
        .send()
        .await
        .unwrap();
    assert_redirect_home(&response);

    let remaining = h.list().await;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|t| t.id != target));

    // Toggle and delete of the gone id are quiet no-ops.
    for path in [format!("/toggle/{target}"), format!("/delete/{target}")] {
        let response = h.get(&path).await;
        assert_redirect_home(&response);
        assert!(response.headers().get("set-cookie").is_none());
    }
    assert_eq!(h.list().await, remaining);

    // Suggest reports a structured not-found error.
    let response = h.get(&format!("/suggest/{target}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Task not found.");
}

#[tokio::test]
async fn suggest_returns_json_tip() {
    let h = Harness::start().await;
    h.add("Buy milk").await;
    let id = h.list().await[0].id.clone();

    let response = h.get(&format!("/suggest/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    let body: SuggestionBody = response.json().await.unwrap();
    assert_eq!(body.suggestion, "Pick some up on the way home.");
}

#[tokio::test]
async fn list_page_renders_tasks_newest_first() {
    let h = Harness::start().await;
    h.add("older <task>").await;
    h.add("newer task").await;

    let response = h.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();

    let newer = html.find("newer task").unwrap();
    let older = html.find("older &lt;task&gt;").unwrap();
    assert!(newer < older);
    assert!(!html.contains("class=\"banner\""));
}

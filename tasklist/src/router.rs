//! HTTP routes: shared state, handlers, and server startup.
//!
//! Every gateway failure is handled here. Form actions redirect back to the
//! list with a flash message, the list page renders an inline banner, and
//! the JSON endpoints answer with `{"error": ...}` and a non-2xx status.

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tasklist_proto::task::{NewTask, Task, TaskId};
use tower_http::trace::TraceLayer;

use crate::flash::Flash;
use crate::page::{self, IndexPage};
use crate::store::{StoreError, TaskGateway};
use crate::suggest::{SuggestError, SuggestionGateway};

/// Banner text when no storage backend is configured.
const STORAGE_DOWN_MESSAGE: &str =
    "Database not connected. Check the server's storage credentials.";

/// Gateways shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Persistence gateway.
    pub tasks: TaskGateway,
    /// Suggestion gateway.
    pub suggestions: SuggestionGateway,
}

impl AppState {
    /// Bundles the two gateways.
    #[must_use]
    pub const fn new(tasks: TaskGateway, suggestions: SuggestionGateway) -> Self {
        Self { tasks, suggestions }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index).post(add_task))
        .route("/toggle/{id}", get(toggle_task))
        .route("/delete/{id}", get(delete_task).post(delete_task))
        .route("/suggest/{id}", get(suggest))
        .route("/api/tasks", get(list_tasks_json))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the server on the given address and returns the bound address
/// and a join handle.
///
/// This is the entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// JSON bodies
// ---------------------------------------------------------------------------

/// Successful `/suggest/{id}` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionBody {
    /// The generated tip.
    pub suggestion: String,
}

/// Error response for the JSON endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// User-facing description of the failure.
    pub error: String,
}

/// `/api/tasks` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListBody {
    /// Tasks, newest first.
    pub tasks: Vec<Task>,
}

/// Availability of one gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayHealth {
    /// Whether the gateway has a backend.
    pub ready: bool,
    /// Why it does not, when it does not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `/healthz` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    /// Persistence gateway.
    pub storage: GatewayHealth,
    /// Suggestion gateway.
    pub suggestions: GatewayHealth,
}

/// A JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Task not found.".into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(_) => Self::not_found(),
            StoreError::Unavailable(_) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: STORAGE_DOWN_MESSAGE.into(),
            },
            StoreError::OperationFailed(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Task storage request failed. Please try again.".into(),
            },
        }
    }
}

impl From<SuggestError> for ApiError {
    fn from(error: SuggestError) -> Self {
        match error {
            SuggestError::Unavailable(_) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "Suggestions are not configured on this server.".into(),
            },
            SuggestError::Failed(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Could not generate a suggestion. Please try again.".into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddTaskForm {
    #[serde(default)]
    content: String,
}

/// Redirects to the list, optionally carrying a flash message.
fn redirect_home(flash: Option<Flash>) -> Response {
    match flash {
        Some(flash) => (
            AppendHeaders([(SET_COOKIE, flash.set_cookie())]),
            Redirect::to("/"),
        )
            .into_response(),
        None => Redirect::to("/").into_response(),
    }
}

/// User-facing text for a failed form action.
fn storage_message(action: &str, error: &StoreError) -> String {
    match error {
        StoreError::Unavailable(_) => STORAGE_DOWN_MESSAGE.to_string(),
        _ => format!("Could not {action}. Please try again."),
    }
}

/// `GET /`: the task list page.
async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let flash = Flash::from_headers(&headers);

    let (tasks, storage_error) = match state.tasks.list_tasks().await {
        Ok(tasks) => (tasks, None),
        Err(e) => {
            tracing::warn!(error = %e, "failed to list tasks");
            (Vec::new(), Some(storage_message("load your tasks", &e)))
        }
    };

    let html = page::render_index(&IndexPage {
        tasks: &tasks,
        flash: flash.as_ref().map(Flash::message),
        storage_error: storage_error.as_deref(),
    });

    if flash.is_some() {
        (AppendHeaders([(SET_COOKIE, Flash::clear_cookie())]), Html(html)).into_response()
    } else {
        Html(html).into_response()
    }
}

/// `POST /`: add a task from the `content` form field, stored as typed.
async fn add_task(
    State(state): State<Arc<AppState>>,
    form: Result<Form<AddTaskForm>, FormRejection>,
) -> Response {
    let content = match form {
        Ok(Form(form)) => form.content,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable add-task form, ignoring");
            return redirect_home(None);
        }
    };

    let Ok(task) = NewTask::new(&content) else {
        return redirect_home(None);
    };

    match state.tasks.add_task(task).await {
        Ok(id) => {
            tracing::info!(task_id = %id, "task added");
            redirect_home(None)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to add task");
            redirect_home(Some(Flash::new(storage_message("add the task", &e))))
        }
    }
}

/// `GET /toggle/{id}`: flip a task's completion flag.
async fn toggle_task(State(state): State<Arc<AppState>>, Path(raw_id): Path<String>) -> Response {
    let Ok(id) = TaskId::parse(&raw_id) else {
        tracing::debug!(task_id = %raw_id, "toggle with invalid id ignored");
        return redirect_home(None);
    };

    let result = match state.tasks.get_task(&id).await {
        Ok(Some(task)) => {
            let completed = !task.completed;
            state
                .tasks
                .update_task(&id, completed)
                .await
                .map(|()| Some(completed))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };

    match result {
        Ok(Some(completed)) => {
            tracing::info!(task_id = %id, completed, "task toggled");
            redirect_home(None)
        }
        Ok(None) | Err(StoreError::NotFound(_)) => {
            tracing::debug!(task_id = %id, "toggle on missing task ignored");
            redirect_home(None)
        }
        Err(e) => {
            tracing::error!(task_id = %id, error = %e, "failed to toggle task");
            redirect_home(Some(Flash::new(storage_message("update the task", &e))))
        }
    }
}

/// `GET|POST /delete/{id}`: remove a task.
async fn delete_task(State(state): State<Arc<AppState>>, Path(raw_id): Path<String>) -> Response {
    let Ok(id) = TaskId::parse(&raw_id) else {
        tracing::debug!(task_id = %raw_id, "delete with invalid id ignored");
        return redirect_home(None);
    };

    match state.tasks.delete_task(&id).await {
        Ok(()) => {
            tracing::info!(task_id = %id, "task deleted");
            redirect_home(None)
        }
        Err(e) => {
            tracing::error!(task_id = %id, error = %e, "failed to delete task");
            redirect_home(Some(Flash::new(storage_message("delete the task", &e))))
        }
    }
}

/// `GET /suggest/{id}`: a generated tip for one task.
async fn suggest(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<SuggestionBody>, ApiError> {
    let id = TaskId::parse(&raw_id).map_err(|_| ApiError::not_found())?;

    let task = state
        .tasks
        .get_task(&id)
        .await
        .inspect_err(|e| tracing::error!(task_id = %id, error = %e, "failed to load task for suggestion"))?
        .ok_or_else(ApiError::not_found)?;

    let suggestion = state
        .suggestions
        .suggest(&task.content)
        .await
        .inspect_err(|e| tracing::error!(task_id = %id, error = %e, "failed to generate suggestion"))?;

    Ok(Json(SuggestionBody { suggestion }))
}

/// `GET /api/tasks`: the task list as JSON.
async fn list_tasks_json(State(state): State<Arc<AppState>>) -> Result<Json<TaskListBody>, ApiError> {
    let tasks = state
        .tasks
        .list_tasks()
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "failed to list tasks"))?;
    Ok(Json(TaskListBody { tasks }))
}

/// `GET /healthz`: which gateways are configured.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    let storage = match &state.tasks {
        TaskGateway::Ready(_) => GatewayHealth {
            ready: true,
            reason: None,
        },
        TaskGateway::Unavailable { reason } => GatewayHealth {
            ready: false,
            reason: Some(reason.clone()),
        },
    };
    let suggestions = match &state.suggestions {
        SuggestionGateway::Ready(_) => GatewayHealth {
            ready: true,
            reason: None,
        },
        SuggestionGateway::Unavailable { reason } => GatewayHealth {
            ready: false,
            reason: Some(reason.clone()),
        },
    };
    Json(HealthBody {
        storage,
        suggestions,
    })
}

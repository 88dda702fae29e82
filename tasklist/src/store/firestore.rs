//! Firestore-backed task store, spoken to over the REST API.
//!
//! One document per task in a flat collection. Creation goes through
//! `documents:commit` so the server can stamp `created_at`; listing goes
//! through `documents:runQuery` ordered on that field. The request bodies
//! and document decoding live in [`tasklist_proto::document`].

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tasklist_proto::document::{self, DatabasePath};
use tasklist_proto::task::{NewTask, Task, TaskId};

use super::auth::{AuthError, ServiceAccount, TokenProvider};
use super::{StoreError, TaskStore};
use crate::config::StoreConfig;

/// Production REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Project id used against an emulator when none is configured.
pub const DEFAULT_EMULATOR_PROJECT: &str = "demo-tasklist";

/// Longest error body excerpt carried into a [`StoreError`].
const MAX_ERROR_EXCERPT: usize = 200;

/// Reasons a [`FirestoreStore`] cannot be constructed.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// No credential was supplied.
    #[error("FIREBASE_CREDENTIALS_JSON is not set")]
    MissingCredentials,

    /// The credential could not be loaded.
    #[error(transparent)]
    Credential(#[from] AuthError),

    /// Neither the config nor the credential names a project.
    #[error("no project id in the credential or configuration")]
    MissingProjectId,

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// How requests are authorized.
pub enum Authorization {
    /// Local emulator; sends the emulator's fixed `owner` token.
    Emulator,
    /// OAuth2 tokens minted from a service account.
    ServiceAccount(TokenProvider),
}

/// [`TaskStore`] backed by a Firestore collection.
pub struct FirestoreStore {
    http: reqwest::Client,
    documents_url: String,
    database: DatabasePath,
    collection: String,
    auth: Authorization,
}

impl FirestoreStore {
    /// Creates a store talking to `base_url` (scheme and host, no path).
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        database: DatabasePath,
        collection: impl Into<String>,
        auth: Authorization,
    ) -> Self {
        let documents_url = format!(
            "{}/v1/{}",
            base_url.trim_end_matches('/'),
            database.documents_root()
        );
        Self {
            http,
            documents_url,
            database,
            collection: collection.into(),
            auth,
        }
    }

    /// Builds the store described by `config`.
    ///
    /// With an emulator host configured, no credential is needed. Otherwise
    /// the service-account credential is required and supplies the project
    /// id unless the config overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if the credential is missing or malformed, no
    /// project id can be determined, or the HTTP client cannot be built.
    pub fn from_config(config: &StoreConfig) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tasklist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SetupError::HttpClient(e.to_string()))?;

        if let Some(host) = &config.emulator_host {
            let base_url = if host.starts_with("http://") || host.starts_with("https://") {
                host.clone()
            } else {
                format!("http://{host}")
            };
            let project = config
                .project_id
                .clone()
                .unwrap_or_else(|| DEFAULT_EMULATOR_PROJECT.to_string());
            tracing::info!(emulator = %base_url, project_id = %project, "using document store emulator");
            return Ok(Self::new(
                http,
                &base_url,
                DatabasePath::new(project),
                config.collection.clone(),
                Authorization::Emulator,
            ));
        }

        let credential = config
            .credentials_json
            .as_ref()
            .ok_or(SetupError::MissingCredentials)?;
        let account = ServiceAccount::from_json(credential.expose())?;
        let project = config
            .project_id
            .clone()
            .or_else(|| account.project_id().map(str::to_string))
            .ok_or(SetupError::MissingProjectId)?;

        Ok(Self::new(
            http.clone(),
            FIRESTORE_BASE_URL,
            DatabasePath::new(project),
            config.collection.clone(),
            Authorization::ServiceAccount(TokenProvider::new(account, http)),
        ))
    }

    /// Project the store writes to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        self.database.project_id()
    }

    fn document_url(&self, id: &TaskId) -> String {
        format!("{}/{}/{id}", self.documents_url, self.collection)
    }

    /// Attaches authorization and sends the request.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let request = match &self.auth {
            Authorization::Emulator => request.bearer_auth("owner"),
            Authorization::ServiceAccount(tokens) => {
                let token = tokens
                    .access_token()
                    .await
                    .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
                request.bearer_auth(token)
            }
        };
        request
            .send()
            .await
            .map_err(|e| StoreError::OperationFailed(format!("request failed: {e}")))
    }

    async fn json_body(response: Response) -> Result<Value, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::OperationFailed(format!("malformed response: {e}")))
    }
}

/// Converts a non-success response into [`StoreError::OperationFailed`],
/// carrying the store's own error message when it sent one.
async fn failure(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_EXCERPT).collect());
    StoreError::OperationFailed(format!("document store returned {status}: {message}"))
}

#[async_trait]
impl TaskStore for FirestoreStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId, StoreError> {
        let id = TaskId::generate();
        let name = self.database.document_name(&self.collection, &id);
        let body = document::create_request(&name, &task);

        let url = format!("{}:commit", self.documents_url);
        let response = self.send(self.http.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }
        tracing::debug!(task_id = %id, "task document created");
        Ok(id)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let body = document::list_request(&self.collection);
        let url = format!("{}:runQuery", self.documents_url);
        let response = self.send(self.http.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let json = Self::json_body(response).await?;
        let results = document::decode_query_results(&json)
            .map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        for (name, error) in &results.rejected {
            tracing::warn!(document = ?name, error = %error, "skipping undecodable task document");
        }
        Ok(results.tasks)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let response = self.send(self.http.get(self.document_url(id))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let json = Self::json_body(response).await?;
                document::decode_document(&json)
                    .map(Some)
                    .map_err(|e| StoreError::OperationFailed(e.to_string()))
            }
            _ => Err(failure(response).await),
        }
    }

    async fn update_task(&self, id: &TaskId, completed: bool) -> Result<(), StoreError> {
        let request = self
            .http
            .patch(self.document_url(id))
            .query(&[
                ("updateMask.fieldPaths", document::FIELD_COMPLETED),
                ("currentDocument.exists", "true"),
            ])
            .json(&document::completed_patch(completed));
        let response = self.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.clone())),
            status if status.is_success() => {
                tracing::debug!(task_id = %id, completed, "task document updated");
                Ok(())
            }
            _ => Err(failure(response).await),
        }
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let response = self.send(self.http.delete(self.document_url(id))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => {
                tracing::debug!(task_id = %id, "task document deleted");
                Ok(())
            }
            _ => Err(failure(response).await),
        }
    }
}

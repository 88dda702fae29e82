//! Suggestion gateway: a one- or two-sentence tip for a task, produced by a
//! hosted text-generation model.
//!
//! Every call is an independent request. Nothing is retried, streamed, or
//! cached.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SuggestConfig;

/// Task text longer than this is truncated before it goes into the prompt.
pub const MAX_PROMPT_TASK_CHARS: usize = 500;

/// Output budget requested from the model.
const MAX_OUTPUT_TOKENS: u32 = 120;

/// Errors returned by the suggestion gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestError {
    /// No API key was configured.
    #[error("suggestions are unavailable: {0}")]
    Unavailable(String),

    /// The generation service failed or returned nothing usable.
    #[error("suggestion failed: {0}")]
    Failed(String),
}

/// Produces text for a prompt.
#[async_trait]
pub trait TipGenerator: Send + Sync {
    /// Sends `prompt` to the model and returns its reply, trimmed.
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError>;
}

/// Builds the prompt asking for a short, actionable tip about `task`.
#[must_use]
pub fn build_prompt(task: &str) -> String {
    let task: String = task.trim().chars().take(MAX_PROMPT_TASK_CHARS).collect();
    format!(
        "You are a helpful productivity assistant. Given the to-do item \"{task}\", \
         give one or two sentences of practical, actionable advice for getting it done. \
         Reply with the advice only."
    )
}

/// A text generator, or the reason none is configured.
#[derive(Clone)]
pub enum SuggestionGateway {
    /// Generator ready for requests.
    Ready(Arc<dyn TipGenerator>),
    /// Suggestions disabled for the lifetime of the process.
    Unavailable {
        /// Human-readable cause, safe to log.
        reason: String,
    },
}

impl std::fmt::Debug for SuggestionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("SuggestionGateway::Ready"),
            Self::Unavailable { reason } => f
                .debug_struct("SuggestionGateway::Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

impl SuggestionGateway {
    /// Wraps a constructed generator.
    pub fn ready(generator: impl TipGenerator + 'static) -> Self {
        Self::Ready(Arc::new(generator))
    }

    /// Creates a gateway that fails every call with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Builds the configured generator, or an unavailable gateway when no
    /// API key is set.
    #[must_use]
    pub fn from_config(config: &SuggestConfig) -> Self {
        let gateway = match &config.api_key {
            None => Self::unavailable("GEMINI_API_KEY is not set"),
            Some(key) => {
                match GeminiClient::new(config.base_url.clone(), config.model.clone(), key.expose())
                {
                    Ok(client) => Self::ready(client),
                    Err(e) => Self::unavailable(e.to_string()),
                }
            }
        };
        match &gateway {
            Self::Ready(_) => tracing::info!(model = %config.model, "suggestions ready"),
            Self::Unavailable { reason } => tracing::warn!(reason = %reason, "suggestions disabled"),
        }
        gateway
    }

    /// Returns `true` if a generator is configured.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Asks for a tip about `task_content`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Unavailable`] if no generator is configured,
    /// or [`SuggestError::Failed`] if generation fails.
    pub async fn suggest(&self, task_content: &str) -> Result<String, SuggestError> {
        match self {
            Self::Ready(generator) => generator.generate(&build_prompt(task_content)).await,
            Self::Unavailable { reason } => Err(SuggestError::Unavailable(reason.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini REST client
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// [`TipGenerator`] backed by the Generative Language `generateContent` API.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// Creates a client for `model` at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Unavailable`] if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, SuggestError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tasklist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SuggestError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.into().trim_end_matches('/'),
            model.into()
        );
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TipGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, SuggestError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SuggestError::Failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| "no error message".to_string());
            return Err(SuggestError::Failed(format!(
                "generation service returned {status}: {message}"
            )));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| SuggestError::Failed(format!("malformed response: {e}")))?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(SuggestError::Failed("model returned no text".into()));
        }
        Ok(text.to_string())
    }
}

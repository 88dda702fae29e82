//! Service-account authentication for the document store.
//!
//! A service-account credential holds an RSA private key. To call the REST
//! API we sign a short-lived JWT assertion with that key (RS256), exchange it
//! at the credential's `token_uri` for an OAuth2 access token, and cache the
//! token until shortly before it expires.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use serde::Deserialize;

/// OAuth2 scope granting document-store access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Default token endpoint when the credential does not name one.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before their reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Errors raised while loading a credential or obtaining a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential JSON could not be parsed or lacks required fields.
    #[error("malformed service-account credential: {0}")]
    MalformedCredential(String),

    /// The private key is not a usable RSA key.
    #[error("invalid service-account private key: {0}")]
    InvalidKey(String),

    /// Signing the assertion failed.
    #[error("failed to sign token assertion")]
    Signing,

    /// The token endpoint rejected the assertion or could not be reached.
    #[error("access token exchange failed: {0}")]
    Exchange(String),
}

#[derive(Deserialize)]
struct CredentialFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    project_id: Option<String>,
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

/// A parsed service-account credential.
pub struct ServiceAccount {
    project_id: Option<String>,
    client_email: String,
    token_uri: String,
    key_pair: RsaKeyPair,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parses the credential JSON as downloaded from the cloud console.
    ///
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) PEM keys.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCredential`] for invalid JSON, a
    /// credential of another type, or missing fields, and
    /// [`AuthError::InvalidKey`] if the key cannot be loaded.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: CredentialFile = serde_json::from_str(json)
            .map_err(|e| AuthError::MalformedCredential(e.to_string()))?;

        if let Some(kind) = file.kind.as_deref()
            && kind != "service_account"
        {
            return Err(AuthError::MalformedCredential(format!(
                "expected type \"service_account\", got {kind:?}"
            )));
        }
        if file.client_email.trim().is_empty() {
            return Err(AuthError::MalformedCredential("client_email is empty".into()));
        }

        let der = pem_to_der(&file.private_key)?;
        let key_pair = if file.private_key.contains("BEGIN RSA PRIVATE KEY") {
            RsaKeyPair::from_der(&der)
        } else {
            RsaKeyPair::from_pkcs8(&der)
        }
        .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        Ok(Self {
            project_id: file.project_id.filter(|p| !p.trim().is_empty()),
            client_email: file.client_email,
            token_uri: file
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            key_pair,
        })
    }

    /// Project the credential belongs to, if it says.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Service-account email address.
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Builds a signed RS256 JWT assertion issued at `issued_at` (unix secs).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the signature cannot be produced.
    pub fn signed_assertion(&self, issued_at: i64) -> Result<String, AuthError> {
        let header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
        let claims = serde_json::json!({
            "iss": self.client_email,
            "scope": DATASTORE_SCOPE,
            "aud": self.token_uri,
            "iat": issued_at,
            "exp": issued_at + ASSERTION_LIFETIME_SECS,
        });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| AuthError::Signing)?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Supplies OAuth2 access tokens for a [`ServiceAccount`], caching each one
/// until shortly before it expires.
pub struct TokenProvider {
    account: ServiceAccount,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Creates a provider that exchanges assertions over `http`.
    #[must_use]
    pub fn new(account: ServiceAccount, http: reqwest::Client) -> Self {
        Self {
            account,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, exchanging a new assertion if the cached
    /// one is missing or about to expire.
    ///
    /// Concurrent callers that all miss the cache each perform an exchange;
    /// the last one to finish wins the cache slot.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if signing or the exchange fails.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let assertion = self.account.signed_assertion(chrono::Utc::now().timestamp())?;
        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| format!("token endpoint returned {status}"),
                |e| match e.error_description {
                    Some(desc) => format!("{}: {desc}", e.error),
                    None => e.error,
                },
            );
            return Err(AuthError::Exchange(reason));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("malformed token response: {e}")))?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(0));
        let refresh_at = Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN);

        tracing::debug!(
            client_email = %self.account.client_email,
            expires_in_secs = lifetime.as_secs(),
            "obtained document store access token"
        );

        *self.cached.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .lock()
            .as_ref()
            .filter(|t| Instant::now() < t.refresh_at)
            .map(|t| t.value.clone())
    }
}

/// Strips PEM armor and decodes the base64 body.
fn pem_to_der(pem: &str) -> Result<Vec<u8>, AuthError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(AuthError::InvalidKey("private key is empty".into()));
    }
    STANDARD
        .decode(body)
        .map_err(|e| AuthError::InvalidKey(e.to_string()))
}

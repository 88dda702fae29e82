//! One-shot status messages carried across a redirect in a cookie.
//!
//! A handler that fails after a form submission sets the `flash` cookie on
//! its redirect; the next page render shows the message and clears it.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Cookie name.
pub const FLASH_COOKIE: &str = "flash";

/// Seconds a flash message survives if the redirect is never followed.
const FLASH_MAX_AGE_SECS: u32 = 60;

/// Longest message accepted back from a client cookie.
const MAX_FLASH_CHARS: usize = 300;

/// A user-facing error message shown once after a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash(String);

impl Flash {
    /// Creates a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }

    /// `Set-Cookie` value storing this message.
    #[must_use]
    pub fn set_cookie(&self) -> String {
        format!(
            "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={FLASH_MAX_AGE_SECS}",
            urlencoding::encode(&self.0)
        )
    }

    /// `Set-Cookie` value that removes the message.
    #[must_use]
    pub fn clear_cookie() -> String {
        format!("{FLASH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }

    /// Reads a pending message from the request's `Cookie` headers.
    ///
    /// Empty, undecodable, or oversized values are ignored.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == FLASH_COOKIE)
            .and_then(|(_, raw)| urlencoding::decode(raw).ok())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty() && text.chars().count() <= MAX_FLASH_CHARS)
            .map(Self)
    }
}

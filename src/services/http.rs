//! Shared HTTP client for the remote services.

use crate::error::{AuraError, Result};
use std::time::Duration;

/// Per-request timeout for weather, news, encyclopedia and LLM calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

const USER_AGENT: &str = concat!("aura/", env!("CARGO_PKG_VERSION"));

/// Build the [`reqwest::Client`] every service shares.
///
/// # Errors
///
/// Returns [`AuraError::Http`] if the client cannot be constructed.
pub fn build_client() -> Result<reqwest::Client> {
    build_client_with_timeout(REQUEST_TIMEOUT)
}

/// Same as [`build_client`] with an explicit timeout.
///
/// # Errors
///
/// Returns [`AuraError::Http`] if the client cannot be constructed.
pub fn build_client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| AuraError::Http(format!("failed to build HTTP client: {e}")))
}

/// Join an OpenAI-style base URL and a `/v1` route.
///
/// The base may be given with or without the `/v1` suffix.
#[must_use]
pub fn v1_endpoint(base_url: &str, route: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = base.strip_suffix("/v1").unwrap_or(base);
    format!("{base}/v1/{}", route.trim_start_matches('/'))
}

/// Turn a non-2xx response into an error carrying the status line.
///
/// # Errors
///
/// Returns [`AuraError::Http`] when the status is not a success.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("error");
    let mut msg = format!("{} {reason} for url: {url}", status.as_u16());
    let body = body.trim();
    if !body.is_empty() && body.len() <= 200 {
        msg.push_str(&format!(" ({body})"));
    }
    Err(AuraError::Http(msg))
}

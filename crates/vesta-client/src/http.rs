//! Error mapping shared by the HTTP clients.

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use url::Url;
use vesta_core::error::AppError;

/// Error body shape used by both commercetools and Algolia.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Converts a transport-level reqwest failure.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {}", e))
    } else {
        AppError::ClientError(e.to_string())
    }
}

/// Converts a non-success response, keeping the API's own message when it sends one.
pub(crate) async fn status_error(resp: Response, what: &str) -> AppError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Unauthorized(format!("{} ({})", message, what))
        }
        StatusCode::CONFLICT => AppError::Conflict(format!("{} ({})", message, what)),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimitExceeded,
        s if s.is_client_error() => AppError::Rejected(format!(
            "HTTP {} from {}: {}",
            status.as_u16(),
            what,
            message
        )),
        _ => AppError::ClientError(format!(
            "HTTP {} from {}: {}",
            status.as_u16(),
            what,
            message
        )),
    }
}

/// Appends `segments` to the path of `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, AppError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AppError::InvalidUrl(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parses a configured base URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    Url::parse(raw).map_err(|e| AppError::InvalidUrl(format!("{}: {}", raw, e)))
}

//! HTTP sending with retry for transient failures.
//!
//! Every client method goes through [`send_json`] or [`send_value`]. The
//! request is rebuilt on each attempt by the `build_request` closure,
//! since a `RequestBuilder` is consumed by `send()`.
//!
//! Connection errors, timeouts, HTTP 429 and HTTP 5xx are retried with
//! exponential backoff per [`RetryPolicy`]. Other 4xx are permanent and
//! fail immediately with the backend's `detail` message.

use climate_map_api_models::ErrorBody;
use serde::de::DeserializeOwned;

use crate::{ApiError, RetryPolicy};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends the request and parses the body as `T`.
#[allow(clippy::future_not_send)]
pub async fn send_json<T, F>(build_request: F, policy: RetryPolicy) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send(&build_request, policy).await?;
    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        ApiError::Json(e)
    })
}

/// Sends the request and returns the body as loose JSON. An empty body
/// (e.g. `204 No Content`) becomes `null`.
#[allow(clippy::future_not_send)]
pub async fn send_value<F>(build_request: F, policy: RetryPolicy) -> Result<serde_json::Value, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send(&build_request, policy).await?;
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Core retry loop. Returns the first 2xx/3xx response.
#[allow(clippy::future_not_send)]
async fn send<F>(build_request: &F, policy: RetryPolicy) -> Result<reqwest::Response, ApiError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < max_retries;
        attempt += 1;

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && can_retry {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(ApiError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) && can_retry {
                    log::warn!("  HTTP {status} from {}", response.url());
                    continue;
                }

                if status.is_client_error() || status.is_server_error() {
                    return Err(status_error(response).await);
                }

                return Ok(response);
            }
        }
    }
}

/// Converts an error response into [`ApiError::Status`], preferring the
/// backend's `detail` over a generic message.
async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| format!("HTTP error! status: {status}"));

    ApiError::Status { status, message }
}

/// 429 and 5xx.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

fn preview(text: &str) -> String {
    if text.chars().count() > BODY_PREVIEW_LEN {
        let head: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

//! Destination server probing and API error classification.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{Error, FieldError, Result};
use crate::util::{compact_text, is_http_url};

/// Well-known path every supported server answers.
pub const PROBE_PATH: &str = "/api/v1/authentication/is_etebase/";

const PROBE_TIMEOUT_SECS: u64 = 10;

/// Map a failed destination response onto the error taxonomy.
#[must_use]
pub fn classify_api_error(status: u16, path: &str, body: &str) -> Error {
    match status {
        401 => Error::Unauthorized,
        404 if path.ends_with(PROBE_PATH) => {
            Error::ServerNotFound(path.trim_end_matches(PROBE_PATH).to_string())
        }
        400 => match field_errors(body) {
            Some(errors) => Error::Validation(errors),
            None => Error::Api(api_message(status, body)),
        },
        _ => Error::Api(api_message(status, body)),
    }
}

/// Check that `base_url` hosts a supported server.
pub async fn probe_server(base_url: &str) -> Result<()> {
    let base_url = base_url.trim().trim_end_matches('/');
    if !is_http_url(base_url) {
        return Err(Error::InvalidInput(format!(
            "server URL must include http:// or https://: {base_url}"
        )));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .build()?;
    let url = format!("{base_url}{PROBE_PATH}");
    let response = client.get(&url).send().await?;

    let status = response.status();
    if status.is_success() {
        tracing::debug!("Server at {} answered the probe", base_url);
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_api_error(status.as_u16(), &url, &body))
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn field_errors(body: &str) -> Option<Vec<FieldError>> {
    let payload = serde_json::from_str::<ErrorResponse>(body).ok()?;
    if payload.errors.is_empty() {
        return None;
    }
    Some(
        payload
            .errors
            .into_iter()
            .map(|error| FieldError {
                field: error.field,
                message: error
                    .detail
                    .or(error.code)
                    .unwrap_or_else(|| "invalid value".to_string()),
            })
            .collect(),
    )
}

fn api_message(status: u16, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorResponse>(body) {
        if let Some(detail) = payload.detail {
            return format!("{} ({status})", compact_text(&detail));
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("HTTP error");
        format!("{reason} ({status})")
    } else {
        format!("{trimmed} ({status})")
    }
}

use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Failure of a call to an external media provider, classified by whether a
/// later retry can succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider}: remote object not found")]
    NotFound { provider: &'static str },

    #[error("{provider}: transient failure: {message}")]
    Retryable {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: request rejected: {message}")]
    Permanent {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn retryable(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Retryable {
            provider,
            message: message.into(),
        }
    }

    pub fn permanent(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Permanent {
            provider,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Retryable { .. })
    }

    /// Maps an HTTP status to the retry class. 408, 429 and 5xx are worth retrying.
    pub fn from_status(provider: &'static str, status: StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            ProviderError::NotFound { provider }
        } else if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            ProviderError::retryable(provider, message)
        } else {
            ProviderError::permanent(provider, message)
        }
    }

    pub fn from_transport(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            ProviderError::permanent(provider, err.to_string())
        } else {
            ProviderError::retryable(provider, err.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Passes successful responses through and turns everything else into a
/// classified `ProviderError`.
pub async fn check_response(
    provider: &'static str,
    res: Result<Response, reqwest::Error>,
) -> Result<Response, ProviderError> {
    let res = res.map_err(|e| ProviderError::from_transport(provider, e))?;
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ProviderError::from_status(provider, status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status("drive", StatusCode::NOT_FOUND, "").is_not_found());
        assert!(
            ProviderError::from_status("drive", StatusCode::SERVICE_UNAVAILABLE, "").is_retryable()
        );
        assert!(
            ProviderError::from_status("vimeo", StatusCode::TOO_MANY_REQUESTS, "").is_retryable()
        );
        let forbidden = ProviderError::from_status("vimeo", StatusCode::FORBIDDEN, "no scope");
        assert!(!forbidden.is_retryable());
        assert!(!forbidden.is_not_found());
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let err = ProviderError::from_status("drive", StatusCode::BAD_REQUEST, &body);
        assert!(err.to_string().len() < 400);
    }
}

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use shared::http::make_error_response;
use store::StoreError;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Terminal outcomes of the submission state machine before persistence.
///
/// Messages are deliberately coarse; submitters never see internal detail.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("form not found")]
    FormNotFound,

    #[error("origin not allowed")]
    OriginNotAllowed,

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("monthly submission limit reached")]
    QuotaExceeded,

    #[error("could not parse submission body: {0}")]
    MalformedBody(String),

    #[error("captcha token missing")]
    CaptchaMissing,

    #[error("captcha verification failed")]
    CaptchaFailed,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::FormNotFound => StatusCode::NOT_FOUND,
            IngestError::OriginNotAllowed | IngestError::QuotaExceeded => StatusCode::FORBIDDEN,
            IngestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            IngestError::MalformedBody(_)
            | IngestError::CaptchaMissing
            | IngestError::CaptchaFailed => StatusCode::BAD_REQUEST,
            IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage problems stay internal; the submitter sees a generic error.
        let message = match &self {
            IngestError::Store(e) => {
                tracing::error!(error = %e, "storage error during ingestion");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = make_error_response(status, &message);
        if let IngestError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert("retry-after", retry_after_secs.into());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(IngestError::FormNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(IngestError::OriginNotAllowed.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            IngestError::RateLimited {
                retry_after_secs: 10
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(IngestError::QuotaExceeded.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            IngestError::MalformedBody("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let response = IngestError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
    }
}

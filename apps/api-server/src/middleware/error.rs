//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use quota_core::RateLimitError;
use quota_core::decision::{Rejection, TOO_MANY_REQUESTS};
use quota_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    /// Quota exhausted (429) or counter store down in fail-closed mode (503).
    #[error("{}", .0.message)]
    RateLimited(Rejection),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited(rejection) => StatusCode::from_u16(rejection.status)
                .unwrap_or(StatusCode::TOO_MANY_REQUESTS),
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        let error = match self {
            AppError::BadRequest(detail) => {
                ErrorResponse::new(400, "Bad Request").with_detail(detail)
            }
            AppError::Unauthorized => ErrorResponse::unauthorized()
                .with_detail("Provide the admin token as a Bearer token."),
            AppError::Forbidden => ErrorResponse::forbidden(),
            AppError::RateLimited(rejection) => {
                let mut error = if rejection.status == TOO_MANY_REQUESTS {
                    ErrorResponse::too_many_requests(&rejection.message)
                } else {
                    ErrorResponse::new(rejection.status, rejection.title)
                        .with_detail(&rejection.message)
                };
                if let Some(headers) = &rejection.headers {
                    for pair in headers.pairs() {
                        builder.insert_header(pair);
                    }
                    if let Some(retry_after) = headers.retry_after {
                        error = error.with_retry_after(retry_after);
                    }
                }
                error
            }
            AppError::ServiceUnavailable(detail) => ErrorResponse::service_unavailable(detail),
        };

        builder.json(error)
    }
}

// Conversion from domain errors
impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Rate limit store unavailable");
                AppError::ServiceUnavailable(
                    "Rate limiting is temporarily unavailable. Please retry shortly.".to_string(),
                )
            }
        }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::RateLimited(rejection)
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

//! Rate limit status and administrative reset.

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use subtle::ConstantTimeEq;

use quota_core::RateLimitStatus;
use quota_shared::ApiResponse;
use quota_shared::dto::{PeriodStatusResponse, RateLimitStatusResponse, ResetLimitsResponse};

use crate::middleware::caller::Caller;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn status_response(status: RateLimitStatus) -> RateLimitStatusResponse {
    RateLimitStatusResponse {
        requests_remaining: status.requests_remaining(),
        principal: status.principal,
        is_allowed: status.is_allowed,
        degraded: status.degraded,
        periods: status
            .periods
            .into_iter()
            .map(|p| PeriodStatusResponse {
                period: p.period.to_string(),
                limit: p.limit,
                remaining: p.remaining,
                reset_at: p.reset_at,
            })
            .collect(),
    }
}

/// Quota state of the calling principal. Does not count as a request.
///
/// GET /api/rate-limit/status
pub async fn status(state: web::Data<AppState>, caller: Caller) -> AppResult<HttpResponse> {
    let status = state
        .engine
        .get_status(&caller.principal, caller.tier)
        .await?;

    Ok(HttpResponse::Ok().json(status_response(status)))
}

/// Clear the current windows of a principal.
///
/// DELETE /api/admin/rate-limit/{principal}
pub async fn reset(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    authorize_admin(&state, &req)?;

    let principal = path.into_inner();
    if principal.trim().is_empty() {
        return Err(AppError::BadRequest("Principal must not be empty".to_string()));
    }

    let keys_deleted = state.engine.reset_limits(&principal).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        ResetLimitsResponse {
            principal,
            keys_deleted,
        },
        "Rate limits reset",
    )))
}

fn authorize_admin(state: &AppState, req: &HttpRequest) -> AppResult<()> {
    // No token configured means no admin access at all.
    let expected = state.admin_token.as_deref().ok_or(AppError::Forbidden)?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !tokens_match(token.trim(), expected) {
        tracing::warn!("Rejected admin request with invalid token");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Constant-time comparison; only the length can leak.
fn tokens_match(given: &str, expected: &str) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("secret", "secret"));
        assert!(!tokens_match("secreT", "secret"));
        assert!(!tokens_match("secret-longer", "secret"));
        assert!(!tokens_match("", "secret"));
    }
}

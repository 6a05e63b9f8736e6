//! Decision surface - turns an engine outcome into the HTTP-visible contract.
//!
//! Pure translation, no I/O. The web layer copies [`RateLimitHeaders::pairs`]
//! onto the response and, for a [`Rejection`], uses its status and message.

use crate::domain::{Decision, Period, RateLimitExceeded, RateLimitStatus};
use crate::error::RateLimitError;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
pub const PERIOD_HEADER: &str = "X-RateLimit-Period";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

pub const TOO_MANY_REQUESTS: u16 = 429;
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Rate limit header values for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp of the window reset.
    pub reset: i64,
    pub period: Period,
    /// Only set on rejections.
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    /// Headers for an admitted request, reporting the most restrictive period.
    /// `None` when the status carries no periods (rate limiting disabled).
    pub fn from_status(status: &RateLimitStatus) -> Option<Self> {
        status.most_restrictive().map(|p| Self {
            limit: p.limit,
            remaining: p.remaining,
            reset: p.reset_at.timestamp(),
            period: p.period,
            retry_after: None,
        })
    }

    pub fn from_exceeded(exceeded: &RateLimitExceeded) -> Self {
        Self {
            limit: exceeded.limit,
            remaining: 0,
            reset: exceeded.reset_at.timestamp(),
            period: exceeded.period,
            retry_after: Some(exceeded.retry_after),
        }
    }

    /// Header name/value pairs in a stable order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(retry_after) = self.retry_after {
            pairs.push((RETRY_AFTER_HEADER, retry_after.to_string()));
        }
        pairs.push((LIMIT_HEADER, self.limit.to_string()));
        pairs.push((REMAINING_HEADER, self.remaining.to_string()));
        pairs.push((RESET_HEADER, self.reset.to_string()));
        pairs.push((PERIOD_HEADER, self.period.as_str().to_string()));
        pairs
    }
}

/// A request the boundary must refuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// 429 for an exhausted quota, 503 for a fail-closed store outage.
    pub status: u16,
    pub title: &'static str,
    pub message: String,
    pub headers: Option<RateLimitHeaders>,
}

impl Rejection {
    pub fn exceeded(exceeded: &RateLimitExceeded) -> Self {
        Self {
            status: TOO_MANY_REQUESTS,
            title: "Too Many Requests",
            message: exceeded.to_string(),
            headers: Some(RateLimitHeaders::from_exceeded(exceeded)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: SERVICE_UNAVAILABLE,
            title: "Service Unavailable",
            message: "Rate limiting is temporarily unavailable. Please retry shortly.".to_string(),
            headers: None,
        }
    }
}

/// What the boundary does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Pass the request on, adding the headers if any.
    Proceed(Option<RateLimitHeaders>),
    Reject(Rejection),
}

/// Translate an engine result into the boundary contract.
pub fn render(result: &Result<Decision, RateLimitError>) -> Outcome {
    match result {
        Ok(Decision::Allowed(status)) => Outcome::Proceed(RateLimitHeaders::from_status(status)),
        Ok(Decision::Denied(exceeded)) => Outcome::Reject(Rejection::exceeded(exceeded)),
        Err(RateLimitError::StoreUnavailable(_)) => Outcome::Reject(Rejection::unavailable()),
    }
}

//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota state of one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatusResponse {
    pub period: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Response for `GET /api/rate-limit/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatusResponse {
    pub principal: String,
    pub is_allowed: bool,
    /// Minimum remaining across periods; absent when rate limiting is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_remaining: Option<u64>,
    /// True when the counter store was unreachable and figures are nominal.
    pub degraded: bool,
    pub periods: Vec<PeriodStatusResponse>,
}

/// Response for the administrative reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetLimitsResponse {
    pub principal: String,
    pub keys_deleted: u64,
}

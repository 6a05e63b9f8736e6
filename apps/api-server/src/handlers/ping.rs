//! A rate limited endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use quota_core::RateLimitStatus;

use crate::middleware::caller::Caller;

#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_remaining: Option<u64>,
}

/// GET /api/v1/ping
pub async fn ping(caller: Caller, status: Option<web::ReqData<RateLimitStatus>>) -> HttpResponse {
    HttpResponse::Ok().json(PingResponse {
        message: "pong",
        principal: caller.principal,
        requests_remaining: status.and_then(|s| s.requests_remaining()),
    })
}

//! Caller resolution - who is being rate limited.

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web};
use std::future::{Ready, ready};

use quota_core::Tier;

use crate::state::AppState;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_TIER_HEADER: &str = "X-User-Tier";

/// The principal a request is counted against.
///
/// Handlers take it as an extractor to look up the caller's quota:
/// ```ignore
/// async fn status(state: web::Data<AppState>, caller: Caller) -> AppResult<HttpResponse> {
///     let status = state.engine.get_status(&caller.principal, caller.tier).await?;
///     Ok(HttpResponse::Ok().json(status))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal: String,
    pub tier: Tier,
}

/// Maps a request to its [`Caller`].
#[derive(Debug, Clone, Copy)]
pub struct CallerResolver {
    trust_identity_headers: bool,
    trust_forwarded_headers: bool,
}

impl CallerResolver {
    pub fn new(trust_identity_headers: bool) -> Self {
        Self {
            trust_identity_headers,
            trust_forwarded_headers: false,
        }
    }

    /// Take the client address from `Forwarded`/`X-Forwarded-For`. Only safe
    /// behind a proxy that overwrites those headers.
    pub fn with_trusted_proxy(mut self, trust_forwarded_headers: bool) -> Self {
        self.trust_forwarded_headers = trust_forwarded_headers;
        self
    }

    /// The authenticated user when an upstream authenticator vouches for the
    /// identity headers, otherwise the client address on the standard tier.
    pub fn resolve(&self, req: &HttpRequest) -> Caller {
        if self.trust_identity_headers {
            if let Some(user_id) = header_value(req, USER_ID_HEADER) {
                let tier = match header_value(req, USER_TIER_HEADER).map(|t| t.parse()) {
                    Some(Ok(tier)) => tier,
                    Some(Err(_)) => {
                        tracing::debug!(user_id = %user_id, "Unknown tier header, using standard");
                        Tier::Standard
                    }
                    None => Tier::Standard,
                };
                return Caller {
                    principal: format!("user:{user_id}"),
                    tier,
                };
            }
        }

        let ip = if self.trust_forwarded_headers {
            req.connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string()
        } else {
            req.peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        Caller {
            principal: format!("ip:{ip}"),
            tier: Tier::Standard,
        }
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequest for Caller {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // Already resolved by the rate limit middleware on limited routes.
        if let Some(caller) = req.extensions().get::<Caller>() {
            return ready(Ok(caller.clone()));
        }

        let resolver = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.resolver)
            .unwrap_or_else(|| CallerResolver::new(false));

        ready(Ok(resolver.resolve(req)))
    }
}

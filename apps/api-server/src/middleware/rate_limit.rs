//! Rate limiting middleware.

use actix_web::{
    Error, HttpMessage, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use quota_core::decision::{self, Outcome, RateLimitHeaders};
use quota_core::{Decision, RateLimitEngine};

use super::caller::CallerResolver;
use super::error::AppError;

/// Rate limiting middleware factory.
///
/// Counts every request against its caller's quota before the inner service
/// runs. Admitted requests carry the `X-RateLimit-*` headers and find the
/// [`quota_core::RateLimitStatus`] and [`super::caller::Caller`] in the
/// request extensions.
pub struct RateLimitMiddleware {
    engine: Arc<RateLimitEngine>,
    resolver: CallerResolver,
}

impl RateLimitMiddleware {
    pub fn new(engine: Arc<RateLimitEngine>, resolver: CallerResolver) -> Self {
        Self { engine, resolver }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            engine: self.engine.clone(),
            resolver: self.resolver,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    engine: Arc<RateLimitEngine>,
    resolver: CallerResolver,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let engine = self.engine.clone();
        let caller = self.resolver.resolve(req.request());

        Box::pin(async move {
            let result = engine
                .check_and_increment(&caller.principal, caller.tier)
                .await;

            match decision::render(&result) {
                Outcome::Proceed(headers) => {
                    if let Ok(Decision::Allowed(status)) = result {
                        req.extensions_mut().insert(status);
                    }
                    req.extensions_mut().insert(caller);

                    let mut res = service.call(req).await?;
                    if let Some(headers) = headers {
                        apply_headers(&mut res, &headers);
                    }
                    Ok(res.map_into_left_body())
                }
                Outcome::Reject(rejection) => {
                    let response = AppError::from(rejection).error_response();
                    let (http_req, _payload) = req.into_parts();
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

fn apply_headers<B>(res: &mut ServiceResponse<B>, headers: &RateLimitHeaders) {
    for (name, value) in headers.pairs() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                res.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = name, "Skipping invalid rate limit header"),
        }
    }
}

//! HTTP handlers and route configuration.

mod health;
mod limits;
mod ping;

use actix_web::web;

use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api")
            // Public routes, not counted
            .route("/health", web::get().to(health::health_check))
            .route("/rate-limit/status", web::get().to(limits::status))
            // Admin routes
            .service(
                web::scope("/admin")
                    .route("/rate-limit/{principal}", web::delete().to(limits::reset)),
            )
            // Rate limited routes
            .service(
                web::scope("/v1")
                    .wrap(RateLimitMiddleware::new(
                        state.engine.clone(),
                        state.resolver,
                    ))
                    .route("/ping", web::get().to(ping::ping)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, dev::ServiceResponse, http::StatusCode, test};
    use async_trait::async_trait;
    use std::sync::Arc;

    use quota_core::ports::{
        CounterIncrement, CounterStore, IncrementOutcome, ManualClock, StoreError,
    };
    use quota_core::{FailureMode, RateLimitEngine, RateLimitSettings};
    use quota_infra::InMemoryCounterStore;

    use crate::middleware::caller::{CallerResolver, USER_ID_HEADER, USER_TIER_HEADER};

    // 15 seconds into a minute window.
    const NOW: i64 = 1_699_999_995;
    const MINUTE_RESET: i64 = 1_700_000_040;

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn read_many(&self, _keys: &[String]) -> Result<Vec<u64>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn increment_and_expire(
            &self,
            _batch: &[CounterIncrement],
        ) -> Result<IncrementOutcome, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn delete_many(&self, _keys: &[String]) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn state_with(store: Arc<dyn CounterStore>, settings: RateLimitSettings) -> AppState {
        let engine = RateLimitEngine::new(store, settings)
            .unwrap()
            .with_clock(Arc::new(ManualClock::at(NOW)));
        AppState {
            engine: Arc::new(engine),
            resolver: CallerResolver::new(true),
            admin_token: Some("secret".to_string()),
        }
    }

    fn memory_state() -> AppState {
        state_with(
            Arc::new(InMemoryCounterStore::new()),
            RateLimitSettings::default(),
        )
    }

    macro_rules! app {
        ($state:expr) => {{
            let state: AppState = $state;
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state.clone()))
                    .configure(|cfg| configure_routes(cfg, &state)),
            )
            .await
        }};
    }

    fn ping(user: &str) -> test::TestRequest {
        test::TestRequest::get()
            .uri("/api/v1/ping")
            .insert_header((USER_ID_HEADER, user))
    }

    fn header<'a, B>(resp: &'a ServiceResponse<B>, name: &str) -> Option<&'a str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[actix_web::test]
    async fn test_admitted_request_carries_headers() {
        let app = app!(memory_state());

        let resp = test::call_service(&app, ping("alice").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "X-RateLimit-Limit"), Some("10"));
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("9"));
        assert_eq!(header(&resp, "X-RateLimit-Period"), Some("minute"));
        assert_eq!(
            header(&resp, "X-RateLimit-Reset"),
            Some(MINUTE_RESET.to_string().as_str())
        );
        assert!(header(&resp, "Retry-After").is_none());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["principal"], "user:alice");
        assert_eq!(body["requests_remaining"], 9);
    }

    #[actix_web::test]
    async fn test_exhausted_quota_returns_429() {
        let app = app!(memory_state());

        for _ in 0..10 {
            let resp = test::call_service(&app, ping("alice").to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = test::call_service(&app, ping("alice").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&resp, "Retry-After"), Some("45"));
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("0"));
        assert_eq!(header(&resp, "X-RateLimit-Limit"), Some("10"));

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 429);
        assert_eq!(body["retry_after"], 45);
        assert_eq!(
            body["detail"],
            "Rate limit exceeded: 10 requests per minute. Try again in 45 seconds."
        );

        // Other principals are unaffected.
        let resp = test::call_service(&app, ping("bob").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_premium_tier_from_identity_headers() {
        let app = app!(memory_state());

        let req = ping("carol")
            .insert_header((USER_TIER_HEADER, "premium"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "X-RateLimit-Limit"), Some("100"));
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("99"));
    }

    #[actix_web::test]
    async fn test_status_does_not_count() {
        let app = app!(memory_state());

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/api/rate-limit/status")
                .insert_header((USER_ID_HEADER, "dave"))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["principal"], "user:dave");
            assert_eq!(body["is_allowed"], true);
            assert_eq!(body["degraded"], false);
            assert_eq!(body["requests_remaining"], 10);
            assert_eq!(body["periods"][0]["period"], "minute");
            assert_eq!(body["periods"][1]["remaining"], 100);
        }

        let resp = test::call_service(&app, ping("dave").to_request()).await;
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("9"));
    }

    #[actix_web::test]
    async fn test_store_outage_fail_open_admits() {
        let app = app!(state_with(
            Arc::new(FailingStore),
            RateLimitSettings::default()
        ));

        let resp = test::call_service(&app, ping("erin").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("10"));
    }

    #[actix_web::test]
    async fn test_store_outage_fail_closed_returns_503() {
        let settings = RateLimitSettings {
            failure_mode: FailureMode::FailClosed,
            ..Default::default()
        };
        let app = app!(state_with(Arc::new(FailingStore), settings));

        let resp = test::call_service(&app, ping("erin").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(header(&resp, "X-RateLimit-Limit").is_none());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 503);
    }

    #[actix_web::test]
    async fn test_disabled_rate_limiting_sets_no_headers() {
        let settings = RateLimitSettings {
            enabled: false,
            ..Default::default()
        };
        let app = app!(state_with(Arc::new(InMemoryCounterStore::new()), settings));

        for _ in 0..20 {
            let resp = test::call_service(&app, ping("frank").to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(header(&resp, "X-RateLimit-Limit").is_none());
        }
    }

    #[actix_web::test]
    async fn test_admin_reset_restores_quota() {
        let app = app!(memory_state());

        for _ in 0..11 {
            test::call_service(&app, ping("gina").to_request()).await;
        }
        let resp = test::call_service(&app, ping("gina").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = test::TestRequest::delete()
            .uri("/api/admin/rate-limit/user:gina")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["principal"], "user:gina");
        assert_eq!(body["data"]["keys_deleted"], 2);

        let resp = test::call_service(&app, ping("gina").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "X-RateLimit-Remaining"), Some("9"));
    }

    #[actix_web::test]
    async fn test_admin_reset_requires_token() {
        let app = app!(memory_state());

        let req = test::TestRequest::delete()
            .uri("/api/admin/rate-limit/user:gina")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::delete()
            .uri("/api/admin/rate-limit/user:gina")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_forwarded_header_rotation_shares_peer_quota() {
        let settings = RateLimitSettings {
            limits: quota_core::domain::LimitPolicy::new()
                .with_limit(quota_core::Period::Minute, 1)
                .with_limit(quota_core::Period::Hour, 100),
            ..Default::default()
        };
        let mut state = state_with(Arc::new(InMemoryCounterStore::new()), settings);
        state.resolver = CallerResolver::new(false);
        let app = app!(state);

        let mut admitted = 0;
        for i in 0..5 {
            let req = test::TestRequest::get()
                .uri("/api/v1/ping")
                .insert_header(("X-Forwarded-For", format!("1.2.3.{i}")))
                .peer_addr("10.0.0.7:5000".parse().unwrap())
                .to_request();
            let resp = test::call_service(&app, req).await;
            if resp.status() == StatusCode::OK {
                admitted += 1;
            } else {
                assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
            }
        }
        assert_eq!(admitted, 1);
    }

    #[actix_web::test]
    async fn test_health_is_not_rate_limited() {
        let settings = RateLimitSettings {
            limits: quota_core::domain::LimitPolicy::new()
                .with_limit(quota_core::Period::Minute, 1)
                .with_limit(quota_core::Period::Hour, 1),
            ..Default::default()
        };
        let app = app!(state_with(Arc::new(InMemoryCounterStore::new()), settings));

        for _ in 0..3 {
            let req = test::TestRequest::get().uri("/api/health").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}

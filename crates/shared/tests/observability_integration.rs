//! 可观测性模块集成测试
//!
//! 未安装 recorder 时指标调用应为空操作；中间件在真实路由上验证。

mod metrics_tests {
    use bookstore_shared::observability::metrics::{
        record_http_request, record_notification, record_payment_submission,
        record_purchase_request, record_purchase_review, record_reading_token_issued,
        record_telegram_update, set_worker_last_run,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/books", 200, 0.05);
        record_http_request("POST", "/api/payments/submit", 413, 0.01);
        record_http_request("GET", "/api/books/{id}", 404, 0.01);
        record_http_request("POST", "/api/admin/approve-purchase", 500, 0.25);
    }

    #[test]
    fn test_record_purchase_flow() {
        record_purchase_request("web", "book");
        record_purchase_request("telegram", "bundle");
        record_payment_submission("recognized");
        record_payment_submission("failed");
        record_purchase_review("approved");
        record_purchase_review("rejected");
    }

    #[test]
    fn test_record_misc() {
        record_telegram_update("start");
        record_telegram_update("ignored");
        record_reading_token_issued();
        record_notification("telegram", true);
        record_notification("web_push", false);
        set_worker_last_run("token_cleanup_worker");
    }
}

mod middleware_tests {
    use axum::{
        Router,
        body::Body,
        extract::Extension,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use bookstore_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    async fn echo_request_id(Extension(id): Extension<RequestId>) -> String {
        id.as_str().to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo_request_id))
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_propagated() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/echo")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }
}

mod config_tests {
    use bookstore_shared::observability::ObservabilityConfig;

    #[test]
    fn test_with_service_name() {
        let config = ObservabilityConfig::default().with_service_name("bookstore");
        assert_eq!(config.service_name, "bookstore");
        assert!(config.otlp_endpoint.is_none());
    }
}

mod guard_tests {
    use bookstore_shared::observability::ObservabilityGuard;

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}

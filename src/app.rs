use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::response::{ApiResponse, Message};
use crate::screening::screen_request;
use crate::state::AppState;
use crate::{auth, subscriptions, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(subscriptions::router())
                .route("/health", get(health)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), screen_request))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health() -> ApiResponse<Message> {
    ApiResponse::ok(Message::new("ok"))
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_enveloped() {
        let app = build_app(AppState::fake());
        let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "data": {"message": "ok"}}));
    }

    #[tokio::test]
    async fn signup_missing_fields_is_validation_error() {
        let app = build_app(AppState::fake());
        let (status, body) =
            call(app, post_json("/api/v1/auth/signup", json!({"email": "a@b.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn malformed_json_is_validation_error() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn verify_rejects_bad_code_format() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            app,
            post_json("/api/v1/auth/verify-otp", json!({"email": "a@b.com", "otp": "12ab"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn signout_requires_token() {
        let app = build_app(AppState::fake());
        let (status, body) = call(app, post_json("/api/v1/auth/signout", json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "AuthError");
    }

    #[tokio::test]
    async fn signout_with_valid_token() {
        let state = AppState::fake();
        let token = state.keys.issue(9, "a@b.com").unwrap();
        let app = build_app(state);
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/signout")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "User signed out successfully");
    }

    #[tokio::test]
    async fn signout_with_tampered_token() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/signout")
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        for (method, uri) in [
            ("POST", "/api/v1/subscriptions/create"),
            ("GET", "/api/v1/subscriptions"),
            ("GET", "/api/v1/users"),
            ("POST", "/api/v1/auth/change-password"),
        ] {
            let app = build_app(AppState::fake());
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let (status, body) = call(app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn screening_blocks_bots_when_enabled() {
        let mut state = AppState::fake();
        let mut cfg = (*state.config).clone();
        cfg.screening.enabled = true;
        state.screen = std::sync::Arc::new(crate::screening::LocalScreen::new(&cfg.screening));
        let app = build_app(state);
        let req = Request::builder()
            .uri("/api/v1/health")
            .header(header::USER_AGENT, "Googlebot/2.1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "Bot activity detected. Access denied.");
    }
}

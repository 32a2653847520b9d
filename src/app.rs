use std::net::SocketAddr;
use axum::{middleware, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::auth::gate::require_basic_auth;
use crate::state::AppState;
use crate::users;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(users::router())
        // applies to the fallback too, so unknown routes are gated as well
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
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
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    fn register_req(body: Value) -> Request<Body> {
        Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, auth: Option<String>) -> Request<Body> {
        let mut b = Request::get(uri);
        if let Some(auth) = auth {
            b = b.header(header::AUTHORIZATION, auth);
        }
        b.body(Body::empty()).unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        to_bytes(res.into_body(), 64 * 1024).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn welcome_is_public() {
        let app = build_app(AppState::fake());
        let res = send(&app, get("/welcome", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_bytes(res).await;
        assert_eq!(body, users::handlers::WELCOME_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn register_is_public_and_hides_the_hash() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let res = send(&app, register_req(json!({"username": "alice", "password": "secret"}))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(body["username"], "alice");
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());

        let stored = state.users.find_by_username("alice").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret");
    }

    #[tokio::test]
    async fn other_routes_need_credentials() {
        let app = build_app(AppState::fake());
        for uri in ["/profile", "/me"] {
            let res = send(&app, get(uri, None)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
        }
    }

    #[tokio::test]
    async fn me_returns_the_caller() {
        let app = build_app(AppState::fake());
        send(
            &app,
            register_req(json!({"username": "alice", "password": "secret", "display_name": "Alice"})),
        )
        .await;

        let res = send(&app, get("/me", Some(basic("alice", "secret")))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["display_name"], "Alice");
    }

    #[tokio::test]
    async fn authenticated_unknown_route_is_not_found() {
        let app = build_app(AppState::fake());
        send(&app, register_req(json!({"username": "alice", "password": "secret"}))).await;
        let res = send(&app, get("/profile", Some(basic("alice", "secret")))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_password_matches_unknown_user() {
        let app = build_app(AppState::fake());
        send(&app, register_req(json!({"username": "alice", "password": "secret"}))).await;

        let wrong = send(&app, get("/me", Some(basic("alice", "guess")))).await;
        let unknown = send(&app, get("/me", Some(basic("nobody", "secret")))).await;

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), unknown.status());
        assert_eq!(
            wrong.headers().get(header::WWW_AUTHENTICATE),
            unknown.headers().get(header::WWW_AUTHENTICATE)
        );
        assert_eq!(body_bytes(wrong).await, body_bytes(unknown).await);
    }

    #[tokio::test]
    async fn reregistering_is_rejected_and_old_password_still_works() {
        let app = build_app(AppState::fake());
        let first = send(&app, register_req(json!({"username": "alice", "password": "secret"}))).await;
        assert_eq!(first.status(), StatusCode::OK);

        let again = send(&app, register_req(json!({"username": "alice", "password": "other"}))).await;
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let old = send(&app, get("/me", Some(basic("alice", "secret")))).await;
        assert_eq!(old.status(), StatusCode::OK);
        let new = send(&app, get("/me", Some(basic("alice", "other")))).await;
        assert_eq!(new.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_registration_is_bad_request() {
        let app = build_app(AppState::fake());
        let res = send(&app, register_req(json!({"username": "", "password": "secret"}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let res = send(&app, register_req(json!({"username": "alice", "password": ""}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_never_reaches_the_store() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let res = send(&app, register_req(json!({"username": "alice"}))).await;
        assert!(res.status().is_client_error());
        assert!(state.users.find_by_username("alice").await.unwrap().is_none());
    }
}

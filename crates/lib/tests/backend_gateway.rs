//! Integration tests: session controller + HTTP gateway against a mock backend.

mod common;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use folio::config::{self, ConfigOrigin, ConfigSource, SessionConfig};
use folio::gateway::{BackendGateway, ErrorKind, GatewayError, HttpGateway};
use folio::i18n::Language;
use folio::session::{Role, SendOutcome, SessionController, UiState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn controller(base_url: &str, max: usize) -> SessionController {
    let config = SessionConfig {
        backend_url: base_url.to_string(),
        max_message_length: max,
        ..SessionConfig::default()
    };
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config.backend_url));
    SessionController::new(Arc::new(config), gateway, Language::En)
}

#[tokio::test]
async fn reply_is_appended_and_request_carries_history() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route(
        "/api/chat/completions",
        post({
            let seen = seen.clone();
            move |Json(body): Json<Value>| async move {
                seen.lock().unwrap().push(body);
                Json(json!({ "message": "hi" }))
            }
        }),
    );
    let base = common::serve(app).await;
    let c = controller(&base, 10);

    let outcome = c.send("hello").await;
    assert!(matches!(outcome, SendOutcome::Replied { degraded: false }));
    let msgs = c.messages().await;
    assert_eq!(msgs.len(), 2);
    assert_eq!((msgs[0].role, msgs[0].content.as_str()), (Role::User, "hello"));
    assert_eq!((msgs[1].role, msgs[1].content.as_str()), (Role::Assistant, "hi"));
    assert_eq!(c.state().await, UiState::Idle);

    c.send("again").await;
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let body = &seen[1];
    assert_eq!(body["message"], "again");
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
    assert_eq!(body["language"], "en");
    assert_eq!(body["model"], "auto");
    assert!(body["user_id"].as_str().unwrap().starts_with("user_"));
    assert_ne!(seen[0]["user_id"], seen[1]["user_id"]);
}

#[tokio::test]
async fn structured_and_choice_replies_are_normalized() {
    let app = Router::new()
        .route(
            "/a/api/chat/completions",
            post(|| async { Json(json!({ "response": "structured", "usage": { "token_count": 3 } })) }),
        )
        .route(
            "/b/api/chat/completions",
            post(|| async { Json(json!({ "choices": [{ "message": { "content": "choice" } }] })) }),
        );
    let base = common::serve(app).await;

    let c = controller(&format!("{}/a", base), 100);
    c.send("q").await;
    assert_eq!(c.messages().await[1].content, "structured");

    let c = controller(&format!("{}/b", base), 100);
    c.send("q").await;
    assert_eq!(c.messages().await[1].content, "choice");
}

#[tokio::test]
async fn rate_limit_is_classified_and_visible_in_transcript() {
    let app = Router::new().route(
        "/api/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "code": 429, "message": "Too many" })),
            )
        }),
    );
    let base = common::serve(app).await;
    let c = controller(&base, 100);

    match c.send("hello").await {
        SendOutcome::Failed(e) => {
            assert_eq!(e.kind(), ErrorKind::RateLimited);
            assert_eq!(e.detail(), Some("Too many"));
        }
        other => panic!("expected rate limit failure, got {:?}", other),
    }
    let msgs = c.messages().await;
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[1].role, Role::Assistant);
    assert!(msgs[1].content.contains("Too many requests"));
    assert_eq!(c.state().await, UiState::Idle);
}

#[tokio::test]
async fn server_error_with_text_body_keeps_detail() {
    let app = Router::new().route(
        "/api/chat/completions",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
    );
    let base = common::serve(app).await;
    let c = controller(&base, 100);

    match c.send("hello").await {
        SendOutcome::Failed(GatewayError::Server { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message.as_deref(), Some("upstream exploded"));
        }
        other => panic!("expected server error, got {:?}", other),
    }
    assert!(c.messages().await[1].content.ends_with("(upstream exploded)"));
}

#[tokio::test]
async fn other_status_is_generic_http() {
    let app = Router::new().route(
        "/api/chat/completions",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": 400, "message": "Missing or empty message" })),
            )
        }),
    );
    let base = common::serve(app).await;
    let c = controller(&base, 100);
    match c.send("hello").await {
        SendOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::GenericHttp),
        other => panic!("expected http error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_json_success_degrades_to_raw_text() {
    let app = Router::new().route("/api/chat/completions", post(|| async { "plain reply" }));
    let base = common::serve(app).await;
    let c = controller(&base, 100);
    assert!(matches!(c.send("hello").await, SendOutcome::Replied { degraded: true }));
    assert_eq!(c.messages().await[1].content, "plain reply");
    assert_eq!(c.state().await, UiState::Idle);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    let c = controller(&common::dead_url(), 100);
    match c.send("hello").await {
        SendOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Network),
        other => panic!("expected network failure, got {:?}", other),
    }
    assert_eq!(c.messages().await.len(), 2);
    assert_eq!(c.state().await, UiState::Idle);
}

#[tokio::test]
async fn remote_config_merges_field_by_field() {
    let app = Router::new()
        .route(
            "/config.json",
            get(|| async {
                Json(json!({
                    "backendUrl": "https://chat.example.com/",
                    "maxMessageLength": 10,
                    "temperature": "warm",
                    "debugMode": true
                }))
            }),
        )
        .route(
            "/broken.json",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
        );
    let base = common::serve(app).await;

    let loaded = config::load(&ConfigSource::Remote(format!("{}/config.json", base))).await;
    assert!(matches!(loaded.origin, ConfigOrigin::Loaded));
    assert_eq!(loaded.config.backend_url, "https://chat.example.com");
    assert_eq!(loaded.config.max_message_length, 10);
    assert_eq!(loaded.config.temperature, 0.7);
    assert!(loaded.config.debug_mode);

    let loaded = config::load(&ConfigSource::Remote(format!("{}/broken.json", base))).await;
    assert!(matches!(loaded.origin, ConfigOrigin::Defaulted(_)));
    assert_eq!(loaded.config, SessionConfig::default());
}

//! Integration test: health monitor against a mock backend's /api/health and /api/config/public.

mod common;

use axum::routing::get;
use axum::{Json, Router};
use folio::config::SessionConfig;
use folio::gateway::{BackendGateway, ErrorKind, HttpGateway};
use folio::health::{HealthMonitor, HealthReport};
use folio::i18n::Language;
use folio::session::{SessionController, UiState};
use serde_json::json;
use std::sync::Arc;

fn wire(base_url: &str) -> (HealthMonitor, SessionController) {
    let config = SessionConfig {
        backend_url: base_url.to_string(),
        health_probe_delay_ms: 0,
        ..SessionConfig::default()
    };
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config.backend_url));
    let monitor = HealthMonitor::new(gateway.clone(), &config);
    let controller = SessionController::new(Arc::new(config), gateway, Language::Zh);
    (monitor, controller)
}

#[tokio::test]
async fn healthy_backend_keeps_chat_enabled() {
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok", "service": "backend" })) }))
        .route(
            "/api/config/public",
            get(|| async { Json(json!({ "chatEnabled": true, "maxMessageLength": 1000 })) }),
        );
    let base = common::serve(app).await;
    let (monitor, controller) = wire(&base);

    let report = monitor.spawn(controller.clone()).await.expect("probe task");
    assert_eq!(
        report,
        HealthReport::Reachable {
            chat_enabled: true,
            remote_override: Some(true)
        }
    );
    assert_eq!(controller.state().await, UiState::Idle);
}

#[tokio::test]
async fn public_flag_turns_chat_off() {
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/api/config/public", get(|| async { Json(json!({ "chatEnabled": false })) }));
    let base = common::serve(app).await;
    let (monitor, controller) = wire(&base);

    let report = monitor.probe(&controller).await;
    assert!(report.is_reachable());
    assert_eq!(controller.state().await, UiState::Disabled);
}

#[tokio::test]
async fn missing_public_flags_are_ignored() {
    let app = Router::new().route("/api/health", get(|| async { "ok" }));
    let base = common::serve(app).await;
    let (monitor, controller) = wire(&base);

    let report = monitor.probe(&controller).await;
    assert_eq!(
        report,
        HealthReport::Reachable {
            chat_enabled: true,
            remote_override: None
        }
    );
}

#[tokio::test]
async fn non_2xx_health_disables_chat() {
    // No /api/health route: the mock answers 404.
    let base = common::serve(Router::new()).await;
    let (monitor, controller) = wire(&base);

    let report = monitor.probe(&controller).await;
    assert!(!report.is_reachable());
    assert_eq!(controller.state().await, UiState::Disabled);
    let snap = controller.snapshot().await;
    assert!(!snap.chat_enabled);
    assert!(snap.status.unwrap().text.contains("无法连接"));
}

#[tokio::test]
async fn unreachable_backend_disables_chat() {
    let (monitor, controller) = wire(&common::dead_url());
    let report = monitor.probe(&controller).await;
    assert!(matches!(report, HealthReport::Unreachable { .. }));
    assert_eq!(controller.state().await, UiState::Disabled);
}

#[tokio::test]
async fn hung_health_check_times_out_and_disables_chat() {
    let app = Router::new().route(
        "/api/health",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            "ok"
        }),
    );
    let base = common::serve(app).await;
    let config = SessionConfig {
        backend_url: base,
        request_timeout_secs: 1,
        health_probe_delay_ms: 0,
        ..SessionConfig::default()
    };
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&config.backend_url));
    let monitor = HealthMonitor::new(gateway.clone(), &config);
    let controller = SessionController::new(Arc::new(config), gateway, Language::En);

    let report = monitor.probe(&controller).await;
    assert!(matches!(
        report,
        HealthReport::Unreachable {
            kind: ErrorKind::Network,
            ..
        }
    ));
    assert_eq!(controller.state().await, UiState::Disabled);
}

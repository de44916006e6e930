//! One-shot backend probe that decides whether chat stays enabled.
//!
//! Runs once, shortly after configuration is loaded. A failed health check disables chat.
//! A successful one keeps (or restores) the configured enablement unless the backend's
//! public flags say `chatEnabled: false`. Remote flags can only turn chat off.

use crate::config::SessionConfig;
use crate::gateway::{BackendGateway, ErrorKind, GatewayError};
use crate::session::{SessionController, StatusKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthReport {
    Reachable {
        /// Enablement applied to the controller.
        chat_enabled: bool,
        /// `chatEnabled` from the public flags, when they could be fetched.
        remote_override: Option<bool>,
    },
    Unreachable {
        kind: ErrorKind,
        detail: String,
    },
}

impl HealthReport {
    pub fn is_reachable(&self) -> bool {
        matches!(self, HealthReport::Reachable { .. })
    }
}

pub struct HealthMonitor {
    gateway: Arc<dyn BackendGateway>,
    delay: Duration,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(gateway: Arc<dyn BackendGateway>, config: &SessionConfig) -> Self {
        Self {
            gateway,
            delay: config.health_probe_delay(),
            timeout: config.request_timeout(),
        }
    }

    /// Probe now and apply the result to `controller`.
    pub async fn probe(&self, controller: &SessionController) -> HealthReport {
        let health = match tokio::time::timeout(self.timeout, self.gateway.health()).await {
            Ok(r) => r,
            Err(_) => Err(GatewayError::Timeout(self.timeout)),
        };
        if let Err(e) = health {
            log::warn!("health: backend unreachable: {}", e);
            controller.set_chat_enabled(false).await;
            controller.report_status(StatusKind::Unreachable).await;
            return HealthReport::Unreachable {
                kind: e.kind(),
                detail: e.to_string(),
            };
        }

        let remote_override = match tokio::time::timeout(self.timeout, self.gateway.public_flags()).await {
            Ok(Ok(flags)) => flags.chat_enabled,
            Ok(Err(e)) => {
                log::debug!("health: public flags unavailable: {}", e);
                None
            }
            Err(_) => {
                log::debug!("health: public flags timed out");
                None
            }
        };
        let chat_enabled = controller.config().chat_enabled && remote_override.unwrap_or(true);
        log::info!(
            "health: backend reachable, chat {}",
            if chat_enabled { "enabled" } else { "disabled" }
        );
        controller.set_chat_enabled(chat_enabled).await;
        controller
            .report_status(if chat_enabled {
                StatusKind::Reachable
            } else {
                StatusKind::Disabled
            })
            .await;
        HealthReport::Reachable {
            chat_enabled,
            remote_override,
        }
    }

    /// Probe once after the configured delay, on a background task.
    pub fn spawn(self, controller: SessionController) -> JoinHandle<HealthReport> {
        tokio::spawn(async move {
            tokio::time::sleep(self.delay).await;
            self.probe(&controller).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChatParams, Completion, PublicFlags};
    use crate::i18n::Language;
    use crate::session::{Message, UiState};
    use async_trait::async_trait;

    struct ProbeGateway {
        healthy: bool,
        flags: Result<PublicFlags, GatewayError>,
    }

    #[async_trait]
    impl BackendGateway for ProbeGateway {
        async fn complete(&self, _m: &[Message], _p: &ChatParams) -> Result<Completion, GatewayError> {
            Err(GatewayError::Network("not used".to_string()))
        }

        async fn health(&self) -> Result<(), GatewayError> {
            if self.healthy {
                Ok(())
            } else {
                Err(GatewayError::Network("connection refused".to_string()))
            }
        }

        async fn public_flags(&self) -> Result<PublicFlags, GatewayError> {
            self.flags.clone()
        }
    }

    fn setup(gw: ProbeGateway, config: SessionConfig) -> (HealthMonitor, SessionController) {
        let gw: Arc<dyn BackendGateway> = Arc::new(gw);
        let monitor = HealthMonitor::new(gw.clone(), &config);
        let controller = SessionController::new(Arc::new(config), gw, Language::En);
        (monitor, controller)
    }

    #[tokio::test]
    async fn unreachable_backend_disables_chat() {
        let (m, c) = setup(
            ProbeGateway {
                healthy: false,
                flags: Ok(PublicFlags::default()),
            },
            SessionConfig::default(),
        );
        let report = m.probe(&c).await;
        assert!(matches!(report, HealthReport::Unreachable { kind: ErrorKind::Network, .. }));
        let snap = c.snapshot().await;
        assert_eq!(snap.state, UiState::Disabled);
        assert!(!snap.chat_enabled);
        assert_eq!(snap.status.unwrap().kind, StatusKind::Unreachable);
    }

    #[tokio::test]
    async fn remote_flag_can_disable() {
        let (m, c) = setup(
            ProbeGateway {
                healthy: true,
                flags: Ok(PublicFlags {
                    chat_enabled: Some(false),
                }),
            },
            SessionConfig::default(),
        );
        let report = m.probe(&c).await;
        assert_eq!(
            report,
            HealthReport::Reachable {
                chat_enabled: false,
                remote_override: Some(false)
            }
        );
        assert_eq!(c.state().await, UiState::Disabled);
    }

    #[tokio::test]
    async fn remote_flag_cannot_enable_configured_off() {
        let (m, c) = setup(
            ProbeGateway {
                healthy: true,
                flags: Ok(PublicFlags {
                    chat_enabled: Some(true),
                }),
            },
            SessionConfig {
                chat_enabled: false,
                ..SessionConfig::default()
            },
        );
        let report = m.probe(&c).await;
        assert!(matches!(report, HealthReport::Reachable { chat_enabled: false, .. }));
        assert_eq!(c.state().await, UiState::Disabled);
    }

    #[tokio::test]
    async fn fresh_success_restores_after_failure() {
        let (m, c) = setup(
            ProbeGateway {
                healthy: true,
                flags: Err(GatewayError::from_status(404, None)),
            },
            SessionConfig::default(),
        );
        c.set_chat_enabled(false).await;
        let report = m.probe(&c).await;
        assert_eq!(
            report,
            HealthReport::Reachable {
                chat_enabled: true,
                remote_override: None
            }
        );
        assert_eq!(c.state().await, UiState::Idle);
        assert_eq!(c.snapshot().await.status.unwrap().kind, StatusKind::Reachable);
    }

    #[tokio::test]
    async fn spawn_waits_for_delay() {
        let (m, c) = setup(
            ProbeGateway {
                healthy: false,
                flags: Ok(PublicFlags::default()),
            },
            SessionConfig {
                health_probe_delay_ms: 20,
                ..SessionConfig::default()
            },
        );
        let handle = m.spawn(c.clone());
        assert_eq!(c.state().await, UiState::Idle);
        let report = handle.await.unwrap();
        assert!(!report.is_reachable());
        assert_eq!(c.state().await, UiState::Disabled);
    }
}

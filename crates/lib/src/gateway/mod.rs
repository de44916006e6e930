//! Backend gateway: the HTTP boundary between the chat controller and the completion service.
//!
//! Endpoints (relative to the configured backend URL):
//! - `POST /api/chat/completions`: one completion per user message
//! - `GET /api/health`: reachability (2xx required)
//! - `GET /api/config/public`: public runtime flags (`chatEnabled`)

mod http;
pub mod reply;

pub use http::HttpGateway;
pub use reply::{Completion, ExtractionRule};

use crate::i18n::Language;
use crate::session::Message;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Failure categories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or oversize input; rejected before any request.
    Validation,
    /// Transport failure or timeout.
    Network,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// Any other non-2xx status.
    GenericHttp,
    /// A body that could not be decoded.
    MalformedResponse,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("backend rate limited the request (HTTP {status})")]
    RateLimited { status: u16, message: Option<String> },
    #[error("backend server error (HTTP {status})")]
    Server { status: u16, message: Option<String> },
    #[error("backend returned HTTP {status}")]
    Http { status: u16, message: Option<String> },
    #[error("backend reply could not be decoded: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Network(e.to_string())
    }
}

impl GatewayError {
    /// Classify a non-2xx status, keeping whatever message the backend sent.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            429 => GatewayError::RateLimited { status, message },
            500..=599 => GatewayError::Server { status, message },
            _ => GatewayError::Http { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => ErrorKind::Network,
            GatewayError::RateLimited { .. } => ErrorKind::RateLimited,
            GatewayError::Server { .. } => ErrorKind::ServerError,
            GatewayError::Http { .. } => ErrorKind::GenericHttp,
            GatewayError::Malformed(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Message supplied by the backend, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::RateLimited { message, .. }
            | GatewayError::Server { message, .. }
            | GatewayError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }
}

/// Per-request parameters sent alongside the history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub temperature: f64,
    pub stream: bool,
    pub language: Language,
    /// Fresh for every request.
    pub user_id: String,
}

/// Runtime flags published by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFlags {
    #[serde(default)]
    pub chat_enabled: Option<bool>,
}

#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Send the ordered history and return the normalized assistant content.
    async fn complete(&self, messages: &[Message], params: &ChatParams) -> Result<Completion, GatewayError>;

    /// Succeeds only on a 2xx health response.
    async fn health(&self) -> Result<(), GatewayError>;

    async fn public_flags(&self) -> Result<PublicFlags, GatewayError>;
}

//! reqwest implementation of [`BackendGateway`].

use super::reply::{self, Completion};
use super::{BackendGateway, ChatParams, GatewayError, PublicFlags};
use crate::session::Message;
use async_trait::async_trait;
use serde::Serialize;

/// Client for the chat backend.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    /// Latest user text; the backend validates this field.
    message: &'a str,
    messages: Vec<WireMessage<'a>>,
    user_id: &'a str,
    language: &'a str,
    model: &'a str,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> CompletionRequest<'a> {
    fn new(messages: &'a [Message], params: &'a ChatParams) -> Self {
        let latest = messages
            .iter()
            .rev()
            .find(|m| m.role.is_user())
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Self {
            message: latest,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            user_id: &params.user_id,
            language: params.language.code(),
            model: &params.model,
            temperature: params.temperature,
            stream: params.stream,
        }
    }
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    /// POST /api/chat/completions.
    async fn complete(&self, messages: &[Message], params: &ChatParams) -> Result<Completion, GatewayError> {
        let url = format!("{}/api/chat/completions", self.base_url);
        let body = CompletionRequest::new(messages, params);
        log::debug!(
            "gateway: POST {} ({} messages, model {})",
            url,
            body.messages.len(),
            body.model
        );
        let res = self.client.post(&url).json(&body).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            log::warn!("gateway: completion failed with {}", status);
            return Err(GatewayError::from_status(
                status.as_u16(),
                reply::error_detail(&text),
            ));
        }
        let completion = reply::normalize_body(&text);
        log::debug!("gateway: reply extracted via {:?}", completion.rule);
        Ok(completion)
    }

    /// GET /api/health.
    async fn health(&self) -> Result<(), GatewayError> {
        let url = format!("{}/api/health", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(
                status.as_u16(),
                reply::error_detail(&body),
            ));
        }
        Ok(())
    }

    /// GET /api/config/public.
    async fn public_flags(&self) -> Result<PublicFlags, GatewayError> {
        let url = format!("{}/api/config/public", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(
                status.as_u16(),
                reply::error_detail(&body),
            ));
        }
        let text = res.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

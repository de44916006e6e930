//! Chat session controller: transcript, send lifecycle, and UI state machine.
//!
//! The controller knows nothing about terminals or pages. It owns the ordered message
//! history and the [`UiState`], talks to a [`BackendGateway`], and publishes
//! [`SessionEvent`]s that an adapter turns into rendering.
//!
//! States: `Idle`, `Sending`, `Disabled`, `Error`. Only `Idle` accepts a send; the
//! `Idle -> Sending` check-and-set happens under the session lock before the request is
//! issued, so at most one request is ever in flight. `Error` is the validation state
//! entered while the draft input is too long (see [`SessionController::input_changed`]).

use crate::config::SessionConfig;
use crate::gateway::{BackendGateway, ChatParams, ErrorKind, GatewayError};
use crate::i18n::strings::{self, UiStrings};
use crate::i18n::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    /// Localized bubble label.
    pub fn label(self, lang: Language) -> &'static str {
        let ui = UiStrings::for_language(lang);
        match self {
            Role::User => ui.user_label,
            Role::Assistant => ui.assistant_label,
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UiState {
    Idle,
    Sending,
    Disabled,
    Error,
}

impl UiState {
    /// Input and send controls are enabled exactly when idle.
    pub fn controls_enabled(self) -> bool {
        self == UiState::Idle
    }
}

/// Why a send was refused locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Busy,
    Disabled,
    Empty,
    TooLong { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ready,
    Sending,
    Replied,
    Cleared,
    Disabled,
    Reachable,
    Unreachable,
    Rejected(Rejection),
    TimedOut,
    Failed(ErrorKind),
}

impl StatusKind {
    fn for_error(e: &GatewayError) -> Self {
        if e.is_timeout() {
            StatusKind::TimedOut
        } else {
            StatusKind::Failed(e.kind())
        }
    }
}

/// Status line: what happened, and its text in the active language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

impl Status {
    fn localized(kind: StatusKind, lang: Language) -> Self {
        Self {
            kind,
            text: strings::status_text(&kind, lang),
        }
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    Rejected(Rejection),
    /// Assistant reply appended. `degraded` when the body was not JSON.
    Replied { degraded: bool },
    /// Failure description appended as an assistant message.
    Failed(GatewayError),
}

/// Notifications for the rendering adapter.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended(Message),
    StateChanged {
        state: UiState,
        controls_enabled: bool,
    },
    Status(Status),
    InputCleared,
    Cleared,
    LanguageChanged {
        language: Language,
        strings: &'static UiStrings,
    },
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub state: UiState,
    pub status: Option<Status>,
    pub language: Language,
    pub chat_enabled: bool,
}

struct Inner {
    messages: Vec<Message>,
    state: UiState,
    status: Option<StatusKind>,
    language: Language,
    chat_enabled: bool,
}

/// Cloneable handle to one chat session. All clones share the same transcript and state.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    config: Arc<SessionConfig>,
    gateway: Arc<dyn BackendGateway>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(config: Arc<SessionConfig>, gateway: Arc<dyn BackendGateway>, language: Language) -> Self {
        let state = if config.chat_enabled {
            UiState::Idle
        } else {
            UiState::Disabled
        };
        let mut messages = Vec::new();
        if config.welcome_message {
            messages.push(Message::assistant(UiStrings::for_language(language).welcome));
        }
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                messages,
                state,
                status: None,
                language,
                chat_enabled: config.chat_enabled,
            })),
            config,
            gateway,
            events,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let g = self.inner.lock().await;
        Snapshot {
            messages: g.messages.clone(),
            state: g.state,
            status: g.status.map(|k| Status::localized(k, g.language)),
            language: g.language,
            chat_enabled: g.chat_enabled,
        }
    }

    pub async fn state(&self) -> UiState {
        self.inner.lock().await.state
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn transition(&self, g: &mut Inner, next: UiState) {
        if g.state == next {
            return;
        }
        log::debug!("session: {:?} -> {:?}", g.state, next);
        g.state = next;
        self.emit(SessionEvent::StateChanged {
            state: next,
            controls_enabled: next.controls_enabled(),
        });
    }

    fn set_status(&self, g: &mut Inner, kind: StatusKind) {
        g.status = Some(kind);
        self.emit(SessionEvent::Status(Status::localized(kind, g.language)));
    }

    fn append(&self, g: &mut Inner, message: Message) {
        g.messages.push(message.clone());
        self.emit(SessionEvent::MessageAppended(message));
    }

    fn validate(&self, g: &Inner, trimmed: &str) -> Option<Rejection> {
        let max = self.config.max_message_length;
        if g.state == UiState::Sending {
            return Some(Rejection::Busy);
        }
        if !g.chat_enabled || g.state == UiState::Disabled {
            return Some(Rejection::Disabled);
        }
        if trimmed.is_empty() {
            return Some(Rejection::Empty);
        }
        if trimmed.chars().count() > max || g.state == UiState::Error {
            return Some(Rejection::TooLong { max });
        }
        None
    }

    /// Send one user message and wait for the reply.
    ///
    /// Rejected input changes nothing but the status line and never reaches the network.
    /// Otherwise the user message is appended, the request is issued with the full history,
    /// and either the reply or a localized failure description is appended before the
    /// controller returns to `Idle` (or `Disabled` if chat was turned off meanwhile).
    pub async fn send(&self, text: &str) -> SendOutcome {
        let trimmed = text.trim();
        let (history, params) = {
            let mut g = self.inner.lock().await;
            if let Some(rejection) = self.validate(&g, trimmed) {
                log::debug!("session: send rejected: {:?}", rejection);
                self.set_status(&mut g, StatusKind::Rejected(rejection));
                return SendOutcome::Rejected(rejection);
            }
            self.append(&mut g, Message::user(trimmed));
            self.emit(SessionEvent::InputCleared);
            self.transition(&mut g, UiState::Sending);
            self.set_status(&mut g, StatusKind::Sending);
            let params = ChatParams {
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                stream: self.config.stream,
                language: g.language,
                user_id: new_user_id(),
            };
            (g.messages.clone(), params)
        };

        let timeout = self.config.request_timeout();
        let result = match tokio::time::timeout(timeout, self.gateway.complete(&history, &params)).await {
            Ok(r) => r,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };

        let mut g = self.inner.lock().await;
        let outcome = match result {
            Ok(completion) => {
                let degraded = completion.is_degraded();
                self.append(&mut g, Message::assistant(completion.content));
                let status = if degraded {
                    StatusKind::Failed(ErrorKind::MalformedResponse)
                } else {
                    StatusKind::Replied
                };
                self.set_status(&mut g, status);
                SendOutcome::Replied { degraded }
            }
            Err(e) => {
                log::warn!("session: request failed: {}", e);
                let status = StatusKind::for_error(&e);
                let text = strings::failure_message(&status, e.detail(), g.language);
                self.append(&mut g, Message::assistant(text));
                self.set_status(&mut g, status);
                SendOutcome::Failed(e)
            }
        };
        let next = if g.chat_enabled {
            UiState::Idle
        } else {
            UiState::Disabled
        };
        self.transition(&mut g, next);
        outcome
    }

    /// Live validation of the draft input: `Idle -> Error` while it is too long,
    /// `Error -> Idle` once it fits again. Returns the resulting state.
    pub async fn input_changed(&self, draft: &str) -> UiState {
        let max = self.config.max_message_length;
        let too_long = draft.trim().chars().count() > max;
        let mut g = self.inner.lock().await;
        match (g.state, too_long) {
            (UiState::Idle, true) => {
                self.transition(&mut g, UiState::Error);
                self.set_status(&mut g, StatusKind::Rejected(Rejection::TooLong { max }));
            }
            (UiState::Error, false) => {
                self.transition(&mut g, UiState::Idle);
                self.set_status(&mut g, StatusKind::Ready);
            }
            _ => {}
        }
        g.state
    }

    /// Empty the transcript. Refused (returns false) while a request is in flight.
    pub async fn clear(&self) -> bool {
        let mut g = self.inner.lock().await;
        if g.state == UiState::Sending {
            log::debug!("session: clear ignored while sending");
            return false;
        }
        g.messages.clear();
        if g.state == UiState::Error {
            self.transition(&mut g, UiState::Idle);
        }
        self.emit(SessionEvent::InputCleared);
        self.emit(SessionEvent::Cleared);
        self.set_status(&mut g, StatusKind::Cleared);
        if self.config.welcome_message {
            let welcome = UiStrings::for_language(g.language).welcome;
            self.append(&mut g, Message::assistant(welcome));
        }
        true
    }

    /// Turn chat on or off at runtime. Never enables beyond the configured `chat_enabled`.
    /// A request in flight finishes first and then lands in `Disabled`.
    pub async fn set_chat_enabled(&self, enabled: bool) {
        let enabled = enabled && self.config.chat_enabled;
        let mut g = self.inner.lock().await;
        if g.chat_enabled == enabled {
            return;
        }
        log::info!("session: chat {}", if enabled { "enabled" } else { "disabled" });
        g.chat_enabled = enabled;
        if g.state == UiState::Sending {
            return;
        }
        if enabled {
            self.transition(&mut g, UiState::Idle);
            self.set_status(&mut g, StatusKind::Ready);
        } else {
            self.transition(&mut g, UiState::Disabled);
            self.set_status(&mut g, StatusKind::Disabled);
        }
    }

    /// Show a status reported by a collaborator (e.g. the health monitor).
    pub async fn report_status(&self, kind: StatusKind) {
        let mut g = self.inner.lock().await;
        self.set_status(&mut g, kind);
    }

    /// Re-render locale-specific strings for `language`.
    pub async fn set_language(&self, language: Language) {
        let mut g = self.inner.lock().await;
        g.language = language;
        self.emit(SessionEvent::LanguageChanged {
            language,
            strings: UiStrings::for_language(language),
        });
        if let Some(kind) = g.status {
            self.emit(SessionEvent::Status(Status::localized(kind, language)));
        }
    }
}

fn new_user_id() -> String {
    format!("user_{}", uuid::Uuid::new_v4().simple())
}

/// Forward language-change notifications into the controller until the sender is dropped.
pub fn spawn_language_bridge(
    mut rx: broadcast::Receiver<Language>,
    controller: SessionController,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(lang) => controller.set_language(lang).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("session: language bridge skipped {} notifications", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

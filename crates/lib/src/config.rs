//! Configuration document and loading.
//!
//! The document is a small JSON object fetched once at startup, either from a URL or
//! from a file (e.g. `~/.folio/config.json`). Every field is optional and falls back to
//! its built-in default on its own, so a partially valid document keeps its valid fields.
//! [`load`] never fails: fetch or parse errors yield the full default configuration.

use crate::i18n::Language;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_MODEL: &str = "auto";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_PROBE_DELAY_MS: u64 = 1000;

const CONFIG_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved session configuration. Shared read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Backend root, without trailing slash.
    pub backend_url: String,
    pub model: String,
    pub temperature: f64,
    /// Forwarded to the backend; replies are always read as a single JSON body.
    pub stream: bool,
    /// Upper bound on trimmed message length, in characters.
    pub max_message_length: usize,
    pub supported_languages: Vec<Language>,
    /// Configured enablement. The health monitor may turn chat off at runtime but never above this.
    pub chat_enabled: bool,
    pub debug_mode: bool,
    pub request_timeout_secs: u64,
    pub health_probe_delay_ms: u64,
    /// Seed the localized welcome message into fresh and cleared transcripts.
    pub welcome_message: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            stream: false,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            supported_languages: Language::ALL.to_vec(),
            chat_enabled: true,
            debug_mode: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            health_probe_delay_ms: DEFAULT_HEALTH_PROBE_DELAY_MS,
            welcome_message: false,
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_probe_delay(&self) -> Duration {
        Duration::from_millis(self.health_probe_delay_ms)
    }

    /// The configuration as a JSON document (same shape that [`merge`] reads).
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Where the configuration document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Remote(String),
    File(PathBuf),
}

impl ConfigSource {
    /// `http(s)://…` is fetched; anything else is a file path.
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.starts_with("http://") || t.starts_with("https://") {
            ConfigSource::Remote(t.to_string())
        } else {
            ConfigSource::File(PathBuf::from(t))
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Remote(url) => f.write_str(url),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("FOLIO_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".folio").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("config endpoint returned {0}")]
    Status(u16),
    #[error("reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config document is not a JSON object")]
    NotAnObject,
}

/// Why a field took its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Missing,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFallback {
    pub field: &'static str,
    pub reason: FallbackReason,
}

/// How the returned configuration was obtained.
#[derive(Debug)]
pub enum ConfigOrigin {
    /// Document read and merged (see [`LoadedConfig::fallbacks`]).
    Loaded,
    /// No document at the source (missing file); defaults used.
    Absent,
    /// The document could not be fetched or parsed; defaults used.
    Defaulted(ConfigError),
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: SessionConfig,
    pub origin: ConfigOrigin,
    pub fallbacks: Vec<FieldFallback>,
}

/// Load the configuration from `source`. Never fails; see the module docs.
pub async fn load(source: &ConfigSource) -> LoadedConfig {
    match fetch_document(source).await {
        Ok(Some(doc)) => {
            let (config, fallbacks) = merge(&doc);
            for fb in &fallbacks {
                if fb.reason == FallbackReason::Invalid {
                    log::warn!("config: invalid value for {}, using default", fb.field);
                }
            }
            LoadedConfig {
                config,
                origin: ConfigOrigin::Loaded,
                fallbacks,
            }
        }
        Ok(None) => {
            log::debug!("config not found at {}, using defaults", source);
            LoadedConfig {
                config: SessionConfig::default(),
                origin: ConfigOrigin::Absent,
                fallbacks: Vec::new(),
            }
        }
        Err(e) => {
            log::warn!("config: {} ({}), using defaults", e, source);
            LoadedConfig {
                config: SessionConfig::default(),
                origin: ConfigOrigin::Defaulted(e),
                fallbacks: Vec::new(),
            }
        }
    }
}

/// Fetch and parse the raw document. `Ok(None)` means the file does not exist.
pub async fn fetch_document(source: &ConfigSource) -> Result<Option<Map<String, Value>>, ConfigError> {
    let text = match source {
        ConfigSource::Remote(url) => {
            let res = reqwest::Client::new()
                .get(url)
                .timeout(CONFIG_FETCH_TIMEOUT)
                .send()
                .await?;
            if !res.status().is_success() {
                return Err(ConfigError::Status(res.status().as_u16()));
            }
            res.text().await?
        }
        ConfigSource::File(path) => match tokio::fs::read_to_string(path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source,
                })
            }
        },
    };
    parse_document(&text).map(Some)
}

pub fn parse_document(text: &str) -> Result<Map<String, Value>, ConfigError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject),
    }
}

struct Merger<'a> {
    doc: &'a Map<String, Value>,
    fallbacks: Vec<FieldFallback>,
}

impl<'a> Merger<'a> {
    fn field<T>(&mut self, key: &'static str, default: T, parse: impl FnOnce(&Value) -> Option<T>) -> T {
        let reason = match self.doc.get(key) {
            None | Some(Value::Null) => FallbackReason::Missing,
            Some(v) => match parse(v) {
                Some(t) => return t,
                None => FallbackReason::Invalid,
            },
        };
        self.fallbacks.push(FieldFallback { field: key, reason });
        default
    }
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn languages(v: &Value) -> Option<Vec<Language>> {
    let mut out = Vec::new();
    for item in v.as_array()? {
        match item.as_str().and_then(Language::from_code) {
            Some(l) if !out.contains(&l) => out.push(l),
            Some(_) => {}
            None => log::warn!("config: ignoring unsupported language {}", item),
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Merge a document over the defaults, one field at a time.
pub fn merge(doc: &Map<String, Value>) -> (SessionConfig, Vec<FieldFallback>) {
    let d = SessionConfig::default();
    let mut m = Merger {
        doc,
        fallbacks: Vec::new(),
    };
    let config = SessionConfig {
        backend_url: m.field("backendUrl", d.backend_url, |v| {
            non_empty_str(v).map(|s| s.trim_end_matches('/').to_string())
        }),
        model: m.field("model", d.model, non_empty_str),
        temperature: m.field("temperature", d.temperature, |v| {
            v.as_f64().filter(|t| t.is_finite() && (0.0..=2.0).contains(t))
        }),
        stream: m.field("stream", d.stream, Value::as_bool),
        max_message_length: m.field("maxMessageLength", d.max_message_length, |v| {
            v.as_u64().filter(|n| *n > 0).map(|n| n as usize)
        }),
        supported_languages: m.field("supportedLanguages", d.supported_languages, languages),
        chat_enabled: m.field("chatEnabled", d.chat_enabled, Value::as_bool),
        debug_mode: m.field("debugMode", d.debug_mode, Value::as_bool),
        request_timeout_secs: m.field("requestTimeoutSecs", d.request_timeout_secs, |v| {
            v.as_u64().filter(|n| *n > 0)
        }),
        health_probe_delay_ms: m.field("healthProbeDelayMs", d.health_probe_delay_ms, Value::as_u64),
        welcome_message: m.field("welcomeMessage", d.welcome_message, Value::as_bool),
    };
    (config, m.fallbacks)
}

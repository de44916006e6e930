//! Active UI language: resolution, application to localized text, persistence, notification.

use super::store::{MemoryPreferenceStore, PreferenceStore, LANGUAGE_KEY};
use super::{default_language, Language};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// A piece of UI text with per-language variants (the `data-zh` / `data-en` / `data-ja` attributes of the page).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    variants: BTreeMap<Language, String>,
    displayed: String,
}

impl LocalizedText {
    pub fn new(displayed: impl Into<String>) -> Self {
        Self {
            variants: BTreeMap::new(),
            displayed: displayed.into(),
        }
    }

    pub fn with(mut self, lang: Language, text: impl Into<String>) -> Self {
        self.variants.insert(lang, text.into());
        self
    }

    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    fn variant(&self, lang: Language) -> Option<&str> {
        self.variants
            .get(&lang)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Requested variant, else `primary`, else the remaining languages in [`Language::ALL`] order,
    /// else whatever is already displayed.
    fn render(&mut self, lang: Language, primary: Language) {
        let chosen = self
            .variant(lang)
            .or_else(|| self.variant(primary))
            .or_else(|| Language::ALL.iter().find_map(|l| self.variant(*l)))
            .map(str::to_string);
        if let Some(text) = chosen {
            self.displayed = text;
        }
    }
}

/// Owns the active language. Persists it and broadcasts every change.
pub struct LanguageState {
    supported: Vec<Language>,
    default: Language,
    current: Language,
    store: Box<dyn PreferenceStore>,
    fallback: MemoryPreferenceStore,
    degraded: bool,
    tx: broadcast::Sender<Language>,
}

impl LanguageState {
    pub fn new(store: Box<dyn PreferenceStore>, supported: &[Language]) -> Self {
        let supported = if supported.is_empty() {
            Language::ALL.to_vec()
        } else {
            supported.to_vec()
        };
        let default = default_language(&supported);
        let (tx, _) = broadcast::channel(16);
        Self {
            supported,
            default,
            current: default,
            store,
            fallback: MemoryPreferenceStore::new(),
            degraded: false,
            tx,
        }
    }

    pub fn current(&self) -> Language {
        self.current
    }

    pub fn default_language(&self) -> Language {
        self.default
    }

    pub fn supported(&self) -> &[Language] {
        &self.supported
    }

    /// True once durable storage has failed and the preference lives in memory only.
    pub fn persistence_degraded(&self) -> bool {
        self.degraded
    }

    /// Receive every resolved language passed to [`Self::apply_language`].
    pub fn subscribe(&self) -> broadcast::Receiver<Language> {
        self.tx.subscribe()
    }

    /// `code` as a supported language, if it is one.
    pub fn validate(&self, code: &str) -> Option<Language> {
        Language::from_code(code).filter(|l| self.supported.contains(l))
    }

    /// Persisted preference, then host locale (prefix match), then the default.
    /// Storage failures are logged and never surface.
    pub fn resolve_initial_language(&mut self, locale: Option<&str>) -> Language {
        let stored = self.load_preference();
        let resolved = stored
            .as_deref()
            .and_then(|s| self.validate(s))
            .or_else(|| {
                locale
                    .and_then(Language::from_locale)
                    .filter(|l| self.supported.contains(l))
            })
            .unwrap_or(self.default);
        log::debug!(
            "language: resolved {} (stored={:?}, locale={:?})",
            resolved,
            stored,
            locale
        );
        self.current = resolved;
        resolved
    }

    /// Switch to `requested` (or the default when unsupported), re-render `nodes`,
    /// persist and notify. Returns the language actually applied.
    pub fn apply_language(&mut self, requested: &str, nodes: &mut [LocalizedText]) -> Language {
        let lang = match self.validate(requested) {
            Some(l) => l,
            None => {
                log::warn!(
                    "language: unsupported language {:?}, using {}",
                    requested,
                    self.default
                );
                self.default
            }
        };
        for node in nodes.iter_mut() {
            node.render(lang, self.default);
        }
        self.current = lang;
        self.save_preference(lang);
        // No subscribers is fine.
        let _ = self.tx.send(lang);
        lang
    }

    fn load_preference(&mut self) -> Option<String> {
        if self.degraded {
            return self.fallback.load(LANGUAGE_KEY).ok().flatten();
        }
        match self.store.load(LANGUAGE_KEY) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("language: preference storage failed, keeping it in memory: {}", e);
                self.degraded = true;
                None
            }
        }
    }

    fn save_preference(&mut self, lang: Language) {
        if !self.degraded {
            match self.store.save(LANGUAGE_KEY, lang.code()) {
                Ok(()) => return,
                Err(e) => {
                    log::warn!("language: preference storage failed, keeping it in memory: {}", e);
                    self.degraded = true;
                }
            }
        }
        let _ = self.fallback.save(LANGUAGE_KEY, lang.code());
    }
}

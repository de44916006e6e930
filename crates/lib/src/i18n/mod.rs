//! Languages, localized copy, and the language state observed by the chat controller.
//!
//! The UI language is a closed set (`zh`, `en`, `ja`). Anything read from storage,
//! configuration or the host locale goes through [`Language::from_code`] or
//! [`Language::from_locale`] before it is used, so a resolved language is always
//! one of the supported values.

mod state;
mod store;
pub mod strings;

pub use state::{LanguageState, LocalizedText};
pub use store::{
    default_preference_dir, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore,
    StorageError, LANGUAGE_KEY,
};
pub use strings::UiStrings;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Ja,
}

impl Language {
    /// Every language, in the fixed order used for text fallback.
    pub const ALL: [Language; 3] = [Language::Zh, Language::En, Language::Ja];

    /// Hard-coded default when nothing else resolves.
    pub const DEFAULT: Language = Language::Zh;

    pub fn code(self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Ja => "ja",
        }
    }

    /// Exact code match (case-insensitive, surrounding whitespace ignored).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "zh" => Some(Language::Zh),
            "en" => Some(Language::En),
            "ja" => Some(Language::Ja),
            _ => None,
        }
    }

    /// Map a host locale (`ja-JP`, `en_US.UTF-8`, `zh`) to a language by its primary subtag.
    pub fn from_locale(locale: &str) -> Option<Self> {
        let primary = locale
            .trim()
            .split(['-', '_', '.', '@'])
            .next()
            .unwrap_or("");
        Self::from_code(primary)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Default language for a supported set: [`Language::DEFAULT`] when supported, else the first entry.
pub fn default_language(supported: &[Language]) -> Language {
    if supported.is_empty() || supported.contains(&Language::DEFAULT) {
        Language::DEFAULT
    } else {
        supported[0]
    }
}

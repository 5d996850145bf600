//! Message catalog
//!
//! Messages are keyed by locale tag, then by message key. Lookup falls back
//! from the exact tag to its language, then to the default locale, and
//! finally returns the key itself so a missing translation never fails a
//! request.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::locale::Locale;
use crate::error::{Error, Result};

const EMBEDDED_MESSAGES: &str = include_str!("../../resources/messages.json");

/// Well-known message keys
pub mod keys {
    pub const SUCCESS: &str = "Success";
    pub const ERROR: &str = "Error";
    pub const NOT_FOUND: &str = "NotFound";
    pub const UNAUTHORIZED: &str = "Unauthorized";
}

/// Localized messages for a set of locales
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_locale: Locale,
    messages: HashMap<Locale, HashMap<String, String>>,
}

impl MessageCatalog {
    /// Catalog built into the binary (en-US, ar, hi)
    pub fn embedded(default_locale: Locale) -> Result<Self> {
        Self::from_json(EMBEDDED_MESSAGES, default_locale)
    }

    /// Load a catalog file; same shape as the embedded one
    pub fn load(path: impl AsRef<Path>, default_locale: Locale) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::info!("Loaded message catalog from: {}", path.display());
        Self::from_json(&contents, default_locale)
    }

    /// Parse `{"<tag>": {"<key>": "<message>"}}`
    pub fn from_json(json: &str, default_locale: Locale) -> Result<Self> {
        let raw: BTreeMap<String, HashMap<String, String>> = serde_json::from_str(json)?;

        let mut messages = HashMap::with_capacity(raw.len());
        for (tag, entries) in raw {
            let locale = Locale::parse(&tag).map_err(|e| {
                Error::invalid_argument(format!("Invalid locale in message catalog: {}", e))
            })?;
            messages.insert(locale, entries);
        }

        Ok(Self {
            default_locale,
            messages,
        })
    }

    /// Locale used when a request names none, or an invalid one
    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Locales with at least one message
    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.messages.keys()
    }

    /// Whether messages exist for exactly this locale or its language
    pub fn supports(&self, locale: &Locale) -> bool {
        self.messages.contains_key(locale)
            || locale
                .parent()
                .is_some_and(|parent| self.messages.contains_key(&parent))
    }

    /// Message for `key` in `locale`, falling back as described above
    pub fn lookup(&self, locale: &Locale, key: &str) -> String {
        self.find(locale, key)
            .or_else(|| self.find(&self.default_locale, key))
            .map(str::to_string)
            .unwrap_or_else(|| key.to_string())
    }

    fn find(&self, locale: &Locale, key: &str) -> Option<&str> {
        let exact = self.messages.get(locale).and_then(|m| m.get(key));
        let message = match exact {
            Some(message) => Some(message),
            None => locale
                .parent()
                .and_then(|parent| self.messages.get(&parent))
                .and_then(|m| m.get(key)),
        };
        message.map(String::as_str)
    }
}

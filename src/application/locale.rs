//! Locale negotiation and the user-facing message catalog.
//!
//! Messages live in `messages.toml`, compiled into the binary and parsed
//! once. Lookup falls back from the requested locale to the configured
//! default, then to English.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::warn;

const MESSAGES: &str = include_str!("messages.toml");
const FALLBACK_LOCALE: &str = "en";

static TABLES: Lazy<HashMap<String, HashMap<String, String>>> = Lazy::new(|| {
    match toml::from_str(MESSAGES) {
        Ok(tables) => tables,
        Err(error) => {
            warn!(error = %error, "message catalog failed to parse, responses fall back to keys");
            HashMap::new()
        }
    }
});

/// Localized message lookup with a configurable default locale.
#[derive(Debug, Clone)]
pub struct Catalog {
    default: String,
}

impl Catalog {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default: default_locale.into(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    /// Look up `key`, preferring `locale`, then the default locale, then
    /// English. Unknown keys come back verbatim so a miss is still visible.
    pub fn message(&self, locale: Option<&str>, key: &str) -> String {
        let chain = [locale.unwrap_or(""), self.default.as_str(), FALLBACK_LOCALE];
        for candidate in chain {
            if candidate.is_empty() {
                continue;
            }
            if let Some(text) = TABLES.get(candidate).and_then(|table| table.get(key)) {
                return text.clone();
            }
        }
        key.to_string()
    }

    /// Pick the best supported locale from an `Accept-Language` header.
    pub fn negotiate(&self, accept_language: Option<&str>) -> String {
        let Some(header) = accept_language else {
            return self.default.clone();
        };
        for part in header.split(',') {
            let tag = part.split(';').next().unwrap_or("").trim();
            if tag.is_empty() || tag == "*" {
                continue;
            }
            let primary = tag.split('-').next().unwrap_or(tag).to_ascii_lowercase();
            if TABLES.contains_key(&primary) {
                return primary;
            }
        }
        self.default.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_requested_locale() {
        let catalog = Catalog::new("en");
        assert_eq!(
            catalog.message(Some("de"), "unauthorized"),
            "Dafür musst du dich anmelden."
        );
    }

    #[test]
    fn lookup_falls_back_to_default_then_english() {
        let catalog = Catalog::new("fr");
        assert_eq!(
            catalog.message(Some("pt"), "internal"),
            "Une erreur est survenue de notre côté."
        );
        let catalog = Catalog::new("pt");
        assert_eq!(
            catalog.message(None, "internal"),
            "Something went wrong on our side."
        );
    }

    #[test]
    fn unknown_key_comes_back_verbatim() {
        let catalog = Catalog::new("en");
        assert_eq!(catalog.message(None, "no-such-key"), "no-such-key");
    }

    #[test]
    fn negotiation_takes_first_supported_tag() {
        let catalog = Catalog::new("en");
        assert_eq!(
            catalog.negotiate(Some("pt-BR, fr;q=0.8, en;q=0.5")),
            "fr"
        );
        assert_eq!(catalog.negotiate(Some("de-AT")), "de");
        assert_eq!(catalog.negotiate(None), "en");
        assert_eq!(catalog.negotiate(Some("zz, *")), "en");
    }
}

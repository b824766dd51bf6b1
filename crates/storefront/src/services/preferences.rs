//! Interface language preference.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{LocalStorage, StorageError, StorageKey};

/// Interface language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fr" => Ok(Self::Fr),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported language '{other}' (expected fr or en)")),
        }
    }
}

/// The stored language choice.
#[derive(Clone)]
pub struct LanguagePreference {
    storage: Arc<dyn LocalStorage>,
}

impl LanguagePreference {
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// The stored language; missing, unreadable or corrupt content yields
    /// the default.
    #[must_use]
    pub fn load(&self) -> Language {
        match self.storage.get(StorageKey::Language) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Language::default(),
            Err(e) => {
                warn!(error = %e, "Stored language unreadable");
                Language::default()
            }
        }
    }

    /// Store the language.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be written.
    pub fn save(&self, language: Language) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&language)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        self.storage.set(StorageKey::Language, &raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_defaults_to_french() {
        let preference = LanguagePreference::new(Arc::new(MemoryStorage::new()));
        assert_eq!(preference.load(), Language::Fr);
    }

    #[test]
    fn test_save_and_load() {
        let storage = Arc::new(MemoryStorage::new());
        let preference = LanguagePreference::new(Arc::clone(&storage) as Arc<dyn LocalStorage>);
        preference.save(Language::En).unwrap();
        assert_eq!(
            storage.get(StorageKey::Language).unwrap().as_deref(),
            Some("\"en\"")
        );
        assert_eq!(preference.load(), Language::En);
    }

    #[test]
    fn test_corrupt_value_is_discarded() {
        let storage = MemoryStorage::with(StorageKey::Language, "klingon");
        let preference = LanguagePreference::new(Arc::new(storage));
        assert_eq!(preference.load(), Language::Fr);
    }

    #[test]
    fn test_parse() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert!("de".parse::<Language>().is_err());
    }
}

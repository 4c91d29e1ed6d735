//! Reader preferences: theme, locale and default font size.

use crate::error::Result;
use crate::reader::theme::{DEFAULT_FONT_SIZE_PX, ThemeId, clamp_font_size};
use crate::store::KeyValueStore;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SETTINGS_KEY: &str = "bookracy:settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    pub theme: ThemeId,
    pub locale: String,
    pub font_size_px: u32,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: ThemeId::Light,
            locale: "en".to_string(),
            font_size_px: DEFAULT_FONT_SIZE_PX,
        }
    }
}

/// Source of the settings a reader session starts with.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> ReaderSettings;

    fn theme(&self) -> ThemeId {
        self.settings().theme
    }

    /// Initial font size, already clamped to the supported range.
    fn font_size_px(&self) -> u32 {
        clamp_font_size(self.settings().font_size_px)
    }
}

/// Fixed settings, for tests and one-off overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub ReaderSettings);

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> ReaderSettings {
        self.0.clone()
    }
}

/// Settings persisted under [`SETTINGS_KEY`].
#[derive(Clone)]
pub struct StoredSettings {
    store: Arc<dyn KeyValueStore>,
}

impl StoredSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, settings: &ReaderSettings) -> Result<()> {
        self.store.set(SETTINGS_KEY, &serde_json::to_string(settings)?)
    }
}

impl SettingsProvider for StoredSettings {
    fn settings(&self) -> ReaderSettings {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return ReaderSettings::default(),
            Err(e) => {
                warn!("cannot read settings: {e}");
                return ReaderSettings::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("ignoring unreadable settings: {e}");
            ReaderSettings::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn stored_settings_default_when_absent() {
        let settings = StoredSettings::new(Arc::new(MemoryStore::new()));
        assert_eq!(settings.settings(), ReaderSettings::default());
        assert_eq!(settings.font_size_px(), 16);
    }

    #[test]
    fn stored_settings_round_trip_and_partial_records() {
        let kv = Arc::new(MemoryStore::new());
        let settings = StoredSettings::new(kv.clone());
        settings
            .save(&ReaderSettings {
                theme: ThemeId::Dark,
                locale: "de".to_string(),
                font_size_px: 60,
            })
            .unwrap();
        assert_eq!(settings.theme(), ThemeId::Dark);
        assert_eq!(settings.settings().locale, "de");
        assert_eq!(settings.font_size_px(), 36);

        kv.set(SETTINGS_KEY, r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(settings.settings().locale, "en");
        assert_eq!(settings.theme(), ThemeId::Dark);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://archive.org";
pub const DEFAULT_CATALOG_ID: &str = "motivational-speech";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogSettings {
    pub base_url: String,
    pub catalog_id: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.into(),
            catalog_id: DEFAULT_CATALOG_ID.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserSettings {
    pub catalog: CatalogSettings,
    pub tick_interval_ms: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            catalog: CatalogSettings::default(),
            tick_interval_ms: 1000,
        }
    }
}

/// JSON settings file. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn catalog(&self) -> CatalogSettings {
        self.read().catalog.clone()
    }

    pub fn update_catalog(&self, settings: CatalogSettings) -> Result<()> {
        let mut guard = self.write();
        guard.catalog = settings;
        self.persist(&guard)
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.read().tick_interval_ms.max(1)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// `$FOCUSFLOW_DATA_DIR`, else the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FOCUSFLOW_DATA_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::data_dir()
        .map(|dir| dir.join("focusflow"))
        .context("could not determine a data directory; set FOCUSFLOW_DATA_DIR")
}

pub fn debug_enabled() -> bool {
    std::env::var("FOCUSFLOW_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

//! Persisted key/value flags
//!
//! A handful of scalars that survive restarts: whether this is the first
//! launch, the discovered final content URL, and the push consent outcome.
//! Stored as one JSON document; every setter writes through.

use crate::error::{GamepackError, GamepackResult};
use crate::types::ConsentOutcome;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Flags shared between the coordinator, the consent resolver and the shell
pub type SharedFlags = Arc<Mutex<PersistedFlags>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FlagValues {
    #[serde(rename = "firstOpenApp", default = "default_first_open")]
    first_open_app: bool,

    #[serde(rename = "savedFinalURL", default)]
    saved_final_url: String,

    #[serde(rename = "pushConsentState", default)]
    push_consent_state: i64,
}

fn default_first_open() -> bool {
    true
}

impl Default for FlagValues {
    fn default() -> Self {
        Self {
            first_open_app: true,
            saved_final_url: String::new(),
            push_consent_state: 0,
        }
    }
}

/// Durable process-wide flags
#[derive(Debug)]
pub struct PersistedFlags {
    path: Option<PathBuf>,
    values: FlagValues,
}

impl PersistedFlags {
    /// Load flags from `path`. A missing or unreadable file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                    log::warn!("Ignoring corrupt flags file {:?}: {}", path, e);
                    FlagValues::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read flags file {:?}: {}", path, e);
                    FlagValues::default()
                }
            }
        } else {
            FlagValues::default()
        };

        Self {
            path: Some(path),
            values,
        }
    }

    /// Flags that are never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: FlagValues::default(),
        }
    }

    pub fn into_shared(self) -> SharedFlags {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn first_open_app(&self) -> bool {
        self.values.first_open_app
    }

    pub fn set_first_open_app(&mut self, value: bool) -> GamepackResult<()> {
        self.update(|v| v.first_open_app = value)
    }

    /// The saved final URL; an empty value means none
    pub fn saved_final_url(&self) -> Option<&str> {
        Some(self.values.saved_final_url.as_str()).filter(|url| !url.is_empty())
    }

    pub fn set_saved_final_url(&mut self, url: &str) -> GamepackResult<()> {
        self.update(|v| v.saved_final_url = url.to_string())
    }

    pub fn consent_outcome(&self) -> ConsentOutcome {
        ConsentOutcome::from_raw(self.values.push_consent_state)
    }

    pub fn set_consent_outcome(&mut self, outcome: ConsentOutcome) -> GamepackResult<()> {
        self.update(|v| v.push_consent_state = outcome.raw())
    }

    pub fn clear_consent_outcome(&mut self) -> GamepackResult<()> {
        self.set_consent_outcome(ConsentOutcome::Unknown)
    }

    /// Apply a change and write it through. On a failed write the in-memory
    /// value is left as it was.
    fn update(&mut self, change: impl FnOnce(&mut FlagValues)) -> GamepackResult<()> {
        let mut next = self.values.clone();
        change(&mut next);
        if let Some(path) = &self.path {
            Self::write(path, &next)?;
        }
        self.values = next;
        Ok(())
    }

    fn write(path: &Path, values: &FlagValues) -> GamepackResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(values).map_err(|e| {
            GamepackError::storage(format!("Failed to serialize flags: {}", e))
        })?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

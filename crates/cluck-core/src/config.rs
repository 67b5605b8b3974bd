//! Shell configuration

use crate::error::{GamepackError, GamepackResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the persisted flags file inside the data directory
pub const FLAGS_FILE_NAME: &str = "flags.json";

/// Gamepack shell configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepackConfig {
    /// User data directory (flags, config)
    pub data_dir: PathBuf,

    /// URL loaded on the first home visit, before a final URL is known
    pub start_url: String,

    /// The content provider's own domain; navigating back to it after the
    /// catch marker means content resolution failed
    pub base_domain: String,

    /// How a host is compared with `base_domain`
    pub base_domain_match: DomainMatch,

    /// Substring identifying the provider's routing endpoint
    pub catch_marker: String,

    /// Response MIME types that are never rendered
    pub blocked_mime_types: Vec<String>,

    /// URL path extensions that are never rendered
    pub blocked_extensions: Vec<String>,

    /// User agent string applied to every web view
    pub user_agent: String,

    /// Minimum time the splash screen stays up, in milliseconds
    pub splash_min_ms: u64,

    /// Longest the splash waits for the content-ready signal, in milliseconds
    pub content_timeout_ms: u64,

    /// Push permission heuristic settings
    pub consent: ConsentConfig,
}

/// Host comparison against the base domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainMatch {
    /// The host contains the domain anywhere
    #[default]
    Contains,
    /// The host is the domain or one of its subdomains
    Subdomain,
}

/// Tunables for the push permission dismissal heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Interval between permission status polls, in milliseconds
    pub poll_interval_ms: u64,

    /// A background/foreground round trip within this many seconds of the
    /// prompt, with the status still undetermined, counts as a dismissal
    pub dismissal_window_secs: u64,

    /// Delay before checking the status after returning to foreground
    pub foreground_check_delay_ms: u64,
}

impl GamepackConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist
    pub fn load(path: &Path) -> GamepackResult<Self> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| GamepackError::config(format!("Invalid config {:?}: {}", path, e)))
    }

    /// Load `config.json` from the default data directory
    pub fn load_default() -> GamepackResult<Self> {
        let defaults = Self::default();
        let mut config = Self::load(&defaults.config_path())?;
        if config.data_dir.as_os_str().is_empty() {
            config.data_dir = defaults.data_dir;
        }
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> GamepackResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub fn flags_path(&self) -> PathBuf {
        self.data_dir.join(FLAGS_FILE_NAME)
    }

    pub fn splash_min_duration(&self) -> Duration {
        Duration::from_millis(self.splash_min_ms)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }
}

impl ConsentConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would make the poll timer panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn dismissal_window(&self) -> Duration {
        Duration::from_secs(self.dismissal_window_secs)
    }

    pub fn foreground_check_delay(&self) -> Duration {
        Duration::from_millis(self.foreground_check_delay_ms)
    }
}

impl Default for GamepackConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cluck-gamepack"),
            start_url: "https://cluckgamepack.website/".to_string(),
            base_domain: "cluckgamepack.website".to_string(),
            base_domain_match: DomainMatch::default(),
            catch_marker: "catch.php".to_string(),
            blocked_mime_types: vec![
                "application/vnd.android.package-archive".to_string(),
                "application/octet-stream".to_string(),
            ],
            blocked_extensions: vec!["apk".to_string()],
            user_agent: format!(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1 CluckGamepack/{}",
                env!("CARGO_PKG_VERSION")
            ),
            splash_min_ms: 2000,
            content_timeout_ms: 15_000,
            consent: ConsentConfig::default(),
        }
    }
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 400,
            dismissal_window_secs: 10,
            foreground_check_delay_ms: 0,
        }
    }
}

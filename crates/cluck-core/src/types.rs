//! Common types used throughout the gamepack shell

use serde::{Deserialize, Serialize};

/// Unique identifier for a browser session (the main view or a popup)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved state of the push permission request.
///
/// Persisted as its integer value; starts as `Unknown` and moves to one of
/// the terminal values exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i64)]
pub enum ConsentOutcome {
    #[default]
    Unknown = 0,
    Allowed = 1,
    Denied = 2,
    Skipped = 3,
}

impl ConsentOutcome {
    /// Decode a persisted value. Anything unrecognised reads as `Unknown`.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::Allowed,
            2 => Self::Denied,
            3 => Self::Skipped,
            _ => Self::Unknown,
        }
    }

    pub fn raw(self) -> i64 {
        self as i64
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Unknown
    }
}

/// Result of a single permission status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
}

/// Navigation request as seen by the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    /// Raw URL; may not parse
    pub url: String,
    pub is_main_frame: bool,
}

impl NavigationRequest {
    pub fn main_frame(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_main_frame: true,
        }
    }

    pub fn sub_frame(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_main_frame: false,
        }
    }
}

/// Navigation response metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Declared MIME type, when the engine reports one
    pub mime_type: Option<String>,
}

impl NavigationResponse {
    pub fn new(url: impl Into<String>, status: u16, mime_type: Option<&str>) -> Self {
        Self {
            url: url.into(),
            status,
            mime_type: mime_type.map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Window requested by the page (`target=_blank`, `window.open`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: String,
}

/// Policy outcome for a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Cancel,
    /// Handed off to the OS; the web view must not render it
    OpenExternally,
}

impl NavigationDecision {
    /// Whether the web view should proceed with the navigation
    pub fn proceeds(self) -> bool {
        self == Self::Allow
    }
}

/// Policy outcome for a navigation response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDecision {
    Allow,
    Cancel,
}

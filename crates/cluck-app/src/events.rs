//! Events delivered to the UI event loop

use cluck_core::types::{ConsentOutcome, SessionId};

/// User events for cross-component communication
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// Load a URL into the main content view
    LoadUrl(String),
    /// Load the bundled fallback page into the main content view
    LoadFallback,
    /// Present a popup session in its own window
    OpenPopup { session: SessionId, url: String },
    /// Tear down a popup window
    ClosePopup(SessionId),
    /// The coordinator reached real content (or gave up on it)
    ContentReady,
    /// Content did not become ready within the configured timeout
    ContentTimedOut,
    /// The push permission outcome is settled
    ConsentSettled(ConsentOutcome),
    /// The onboarding page was accepted
    PrivacyAccepted,
    /// The splash minimum display time passed
    SplashElapsed,
}

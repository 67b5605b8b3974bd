//! Launch orchestration
//!
//! First launch goes through the privacy page; later launches go straight to
//! the game. The splash view stays up until everything the current route
//! waits for has arrived.

use cluck_core::{GamepackConfig, PersistedFlags};
use url::Url;

/// Screen shown after the splash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchRoute {
    /// Onboarding/consent page
    Privacy,
    /// The game
    Home,
}

/// What to show at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub route: LaunchRoute,
    /// URL loaded when the home route is shown
    pub home_url: String,
}

impl LaunchPlan {
    pub fn from_flags(flags: &PersistedFlags, config: &GamepackConfig) -> Self {
        let route = if flags.first_open_app() {
            LaunchRoute::Privacy
        } else {
            LaunchRoute::Home
        };

        let home_url = flags
            .saved_final_url()
            .filter(|saved| is_remote_url(saved))
            .unwrap_or(config.start_url.as_str())
            .to_string();

        Self { route, home_url }
    }
}

fn is_remote_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Signals the splash waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchSignal {
    SplashElapsed,
    ConsentSettled,
    ContentReady,
    /// Content never signalled readiness; stands in for `ContentReady`
    ContentTimedOut,
}

/// Opens exactly once, after every required signal arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchGate {
    splash: bool,
    consent: bool,
    content: bool,
    opened: bool,
}

impl LaunchGate {
    pub fn new(route: LaunchRoute) -> Self {
        // The privacy page is bundled; only the splash time matters
        let waits_for_game = route == LaunchRoute::Home;
        Self {
            splash: false,
            consent: !waits_for_game,
            content: !waits_for_game,
            opened: false,
        }
    }

    /// Gate for loading the game once onboarding is accepted
    pub fn after_onboarding() -> Self {
        Self {
            splash: true,
            consent: false,
            content: false,
            opened: false,
        }
    }

    /// Record a signal. Returns true when this call opened the gate.
    pub fn mark(&mut self, signal: LaunchSignal) -> bool {
        match signal {
            LaunchSignal::SplashElapsed => self.splash = true,
            LaunchSignal::ConsentSettled => self.consent = true,
            LaunchSignal::ContentReady | LaunchSignal::ContentTimedOut => self.content = true,
        }

        if !self.opened && self.splash && self.consent && self.content {
            self.opened = true;
            return true;
        }
        false
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

//! Navigation policy for the embedded game view
//!
//! Every navigation request and response of the content web view passes
//! through a [`BrowserDelegate`]. The [`NavigationCoordinator`] implementation
//! follows the provider's redirect chain through its catch endpoint, blocks
//! binary downloads, routes non-web schemes to the OS, remembers the first real
//! content URL and signals once when content is considered ready.

pub mod bridge;
pub mod coordinator;
pub mod download_filter;

use cluck_core::types::{
    NavigationDecision, NavigationRequest, NavigationResponse, PopupRequest, ResponseDecision,
    SessionId,
};
use cluck_core::{DomainMatch, GamepackResult};
use url::Url;

pub use bridge::{RawScriptMessage, ScriptMessage, SCRIPT_BRIDGE};
pub use coordinator::{NavigationCoordinator, NavigationSession};
pub use download_filter::{BlockingStats, DownloadFilter};

/// One method per browser event kind.
///
/// Every method returns synchronously so the engine's decision callback is
/// answered on every path.
pub trait BrowserDelegate {
    /// Decide whether a navigation request proceeds
    fn decide_request(&mut self, request: &NavigationRequest) -> NavigationDecision;

    /// Decide whether a received response is rendered
    fn decide_response(&mut self, response: &NavigationResponse) -> ResponseDecision;

    /// A new top-level navigation sequence started
    fn navigation_started(&mut self);

    /// Message posted from page script
    fn script_message(&mut self, message: ScriptMessage);

    /// The page asked for a new window; returns the id of the popup session
    fn popup_requested(&mut self, request: PopupRequest) -> SessionId;

    /// A popup session was closed and should leave the screen
    fn popup_closed(&mut self, session: SessionId);

    /// A navigation failed (DNS, TLS, timeout)
    fn navigation_failed(&mut self, url: &str, error: &str);
}

/// Hands non-web URLs (`tel:`, `mailto:`, store links) to the OS
pub trait ExternalOpener: Send {
    /// Whether the OS has a handler for this URL
    fn can_open(&self, url: &Url) -> bool;

    /// Perform the hand-off
    fn open(&self, url: &Url) -> GamepackResult<()>;
}

/// Presents popup sessions as dismissible overlays
pub trait PresentationHost: Send {
    fn present(&self, session: SessionId, url: &str);

    fn dismiss(&self, session: SessionId);
}

/// Loads content into the main web view
pub trait ContentLoader: Send {
    fn load_url(&self, url: &Url);

    /// Load the bundled fallback page; errors when none is bundled
    fn load_fallback(&self) -> GamepackResult<()>;
}

/// Whether `host` matches `domain` under `mode`. Case and a trailing dot are
/// ignored; an empty domain matches nothing.
pub fn host_matches(host: &str, domain: &str, mode: DomainMatch) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    match mode {
        DomainMatch::Contains => host.contains(&domain),
        DomainMatch::Subdomain => host == domain || host.ends_with(&format!(".{}", domain)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matches_contains() {
        let domain = "cluckgamepack.website";
        let mode = DomainMatch::Contains;
        assert!(host_matches("cluckgamepack.website", domain, mode));
        assert!(host_matches("www.cluckgamepack.website", domain, mode));
        assert!(host_matches("CluckGamepack.Website.", domain, mode));
        assert!(host_matches("cluckgamepack.website.cdn-example.net", domain, mode));
        assert!(host_matches("notcluckgamepack.website", domain, mode));
        assert!(!host_matches("game.example.com", domain, mode));
        assert!(!host_matches("anything.com", "", mode));
    }

    #[test]
    fn test_host_matches_subdomain() {
        let domain = "cluckgamepack.website";
        let mode = DomainMatch::Subdomain;
        assert!(host_matches("cluckgamepack.website", domain, mode));
        assert!(host_matches("www.cluckgamepack.website", domain, mode));
        assert!(host_matches("CluckGamepack.Website.", domain, mode));
        assert!(!host_matches("notcluckgamepack.website", domain, mode));
        assert!(!host_matches("cluckgamepack.website.cdn-example.net", domain, mode));
        assert!(!host_matches("anything.com", "", mode));
    }
}

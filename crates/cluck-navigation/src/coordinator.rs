//! The navigation coordinator
//!
//! The content provider sends the player through a tracking endpoint (the
//! catch marker) before either serving the game or bouncing back to its own
//! base domain. The coordinator lets the catch hop through, treats a return
//! to the base domain as "no content" and cancels it, and records the first
//! successful non-provider page as the final URL for future launches. Either
//! way the content-ready signal fires so the launch flow never hangs.

use crate::bridge::ScriptMessage;
use crate::download_filter::{BlockingStats, DownloadFilter};
use crate::{host_matches, BrowserDelegate, ContentLoader, ExternalOpener, PresentationHost};
use cluck_core::types::{
    NavigationDecision, NavigationRequest, NavigationResponse, PopupRequest, ResponseDecision,
    SessionId,
};
use cluck_core::{DomainMatch, GamepackConfig, SharedFlags};
use std::collections::HashMap;
use std::sync::PoisonError;
use url::Url;

/// Schemes rendered in the web view; anything else goes to the OS
const WEB_SCHEMES: &[&str] = &["http", "https", "about"];

/// Per-navigation-sequence state, reset by `navigation_started`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationSession {
    /// Main-frame requests seen in this sequence
    pub redirect_count: u32,
    /// The catch marker was seen in this sequence
    pub catch_detected: bool,
    /// The content-ready signal already fired in this sequence
    pub content_loaded_fired: bool,
}

type ContentReadyHandler = Box<dyn Fn() + Send>;

/// Navigation policy for the main web view and its popups
pub struct NavigationCoordinator {
    base_domain: String,
    domain_match: DomainMatch,
    catch_marker: String,
    filter: DownloadFilter,
    flags: SharedFlags,
    opener: Box<dyn ExternalOpener>,
    loader: Box<dyn ContentLoader>,
    host: Box<dyn PresentationHost>,
    on_content_ready: Option<ContentReadyHandler>,
    session: NavigationSession,
    final_url_saved: bool,
    navigate_handled: bool,
    popups: HashMap<SessionId, String>,
}

impl NavigationCoordinator {
    pub fn new(
        config: &GamepackConfig,
        flags: SharedFlags,
        opener: impl ExternalOpener + 'static,
        loader: impl ContentLoader + 'static,
        host: impl PresentationHost + 'static,
    ) -> Self {
        log::info!(
            "Initializing navigation coordinator (base domain: {}, catch marker: {})",
            config.base_domain,
            config.catch_marker
        );

        Self {
            base_domain: config.base_domain.clone(),
            domain_match: config.base_domain_match,
            catch_marker: config.catch_marker.clone(),
            filter: DownloadFilter::new(&config.blocked_mime_types, &config.blocked_extensions),
            flags,
            opener: Box::new(opener),
            loader: Box::new(loader),
            host: Box::new(host),
            on_content_ready: None,
            session: NavigationSession::default(),
            final_url_saved: false,
            navigate_handled: false,
            popups: HashMap::new(),
        }
    }

    /// Register the content-ready listener
    pub fn with_content_ready_handler(mut self, handler: impl Fn() + Send + 'static) -> Self {
        self.on_content_ready = Some(Box::new(handler));
        self
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    /// Whether a final URL was written during this run
    pub fn final_url_saved(&self) -> bool {
        self.final_url_saved
    }

    pub fn open_popups(&self) -> usize {
        self.popups.len()
    }

    pub fn get_stats(&self) -> BlockingStats {
        self.filter.get_stats()
    }

    fn is_base_domain(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host_matches(host, &self.base_domain, self.domain_match))
    }

    fn fire_content_ready(&mut self) {
        if self.session.content_loaded_fired {
            return;
        }
        self.session.content_loaded_fired = true;
        log::info!("Content ready");
        if let Some(handler) = &self.on_content_ready {
            handler();
        }
    }

    fn save_final_url(&mut self, url: &Url) {
        self.final_url_saved = true;
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        match flags.set_saved_final_url(url.as_str()) {
            Ok(()) => log::info!("Saved final URL: {}", url),
            Err(e) => log::error!("Failed to persist final URL {}: {}", url, e),
        }
    }

    fn load(&self, target: &str) {
        let lower = target.trim().to_ascii_lowercase();
        if lower.starts_with("http") {
            if let Ok(url) = Url::parse(target.trim()) {
                self.loader.load_url(&url);
                return;
            }
        }

        log::info!("No remote URL in {:?}, loading fallback page", target);
        if let Err(e) = self.loader.load_fallback() {
            log::warn!("Fallback page unavailable for {:?}: {}", target, e);
        }
    }
}

impl BrowserDelegate for NavigationCoordinator {
    fn decide_request(&mut self, request: &NavigationRequest) -> NavigationDecision {
        if !request.is_main_frame {
            return NavigationDecision::Allow;
        }

        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Allowing unparseable URL {:?}: {}", request.url, e);
                return NavigationDecision::Allow;
            }
        };

        self.session.redirect_count += 1;
        log::info!(
            "Navigation #{} -> {}",
            self.session.redirect_count,
            request.url
        );

        if url.scheme() == "file" || request.url.starts_with("about:blank") {
            return NavigationDecision::Allow;
        }

        if !self.catch_marker.is_empty() && request.url.contains(&self.catch_marker) {
            self.session.catch_detected = true;
            log::info!("Detected catch marker: {}", request.url);
            return NavigationDecision::Allow;
        }

        if self.session.catch_detected && self.is_base_domain(&url) {
            log::info!("Blocked fallback to base domain after catch: {}", request.url);
            self.fire_content_ready();
            return NavigationDecision::Cancel;
        }

        let scheme = url.scheme().to_ascii_lowercase();
        if !WEB_SCHEMES.contains(&scheme.as_str()) {
            if !self.opener.can_open(&url) {
                log::warn!("No handler for {}, letting the web view show it", url);
                return NavigationDecision::Allow;
            }

            log::info!("Opening external URL: {}", url);
            if let Err(e) = self.opener.open(&url) {
                log::warn!("Failed to open {} externally: {}", url, e);
            }
            return NavigationDecision::OpenExternally;
        }

        NavigationDecision::Allow
    }

    fn decide_response(&mut self, response: &NavigationResponse) -> ResponseDecision {
        if self
            .filter
            .should_block(&response.url, response.mime_type.as_deref())
        {
            log::warn!("Blocked binary download: {}", response.url);
            return ResponseDecision::Cancel;
        }

        if !response.is_success() || self.final_url_saved {
            return ResponseDecision::Allow;
        }

        let Ok(url) = Url::parse(&response.url) else {
            return ResponseDecision::Allow;
        };

        let is_catch =
            !self.catch_marker.is_empty() && response.url.contains(&self.catch_marker);
        let is_remote = matches!(url.scheme(), "http" | "https");
        if is_remote && !is_catch && !self.is_base_domain(&url) {
            self.save_final_url(&url);
            self.fire_content_ready();
        }

        ResponseDecision::Allow
    }

    fn navigation_started(&mut self) {
        log::debug!("Navigation sequence started");
        self.session = NavigationSession::default();
    }

    fn script_message(&mut self, message: ScriptMessage) {
        match message {
            ScriptMessage::NavigateTo(target) => {
                if self.navigate_handled {
                    log::info!("Ignored duplicate navigate message: {}", target);
                    return;
                }
                self.navigate_handled = true;
                log::info!("Navigate message received: {}", target);
                self.load(&target);
            }
            ScriptMessage::MalformedNavigate(body) => {
                log::warn!("Ignored navigate message without URL: {}", body);
            }
            ScriptMessage::ContentLoaded => self.fire_content_ready(),
            ScriptMessage::Unknown(name) => {
                log::debug!("Ignored script message {:?}", name);
            }
        }
    }

    fn popup_requested(&mut self, request: PopupRequest) -> SessionId {
        let id = SessionId::new();
        log::info!("Popup {:?} requested: {}", id, request.url);
        self.host.present(id, &request.url);
        self.popups.insert(id, request.url);
        id
    }

    fn popup_closed(&mut self, session: SessionId) {
        match self.popups.remove(&session) {
            Some(url) => {
                log::info!("Popup {:?} closed ({})", session, url);
                self.host.dismiss(session);
            }
            None => log::debug!("Close for unknown popup {:?}", session),
        }
    }

    fn navigation_failed(&mut self, url: &str, error: &str) {
        log::warn!("Load failed for {}: {}", url, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluck_core::{GamepackError, GamepackResult, PersistedFlags};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeOpener {
        handles: bool,
        opened: Arc<Mutex<Vec<String>>>,
    }

    impl ExternalOpener for FakeOpener {
        fn can_open(&self, _url: &Url) -> bool {
            self.handles
        }

        fn open(&self, url: &Url) -> GamepackResult<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeLoader {
        has_fallback: bool,
        loaded: Arc<Mutex<Vec<String>>>,
        fallbacks: Arc<AtomicUsize>,
    }

    impl ContentLoader for FakeLoader {
        fn load_url(&self, url: &Url) {
            self.loaded.lock().unwrap().push(url.to_string());
        }

        fn load_fallback(&self) -> GamepackResult<()> {
            if self.has_fallback {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            } else {
                Err(GamepackError::not_found("index.html"))
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeHost {
        presented: Arc<Mutex<Vec<(SessionId, String)>>>,
        dismissed: Arc<Mutex<Vec<SessionId>>>,
    }

    impl PresentationHost for FakeHost {
        fn present(&self, session: SessionId, url: &str) {
            self.presented.lock().unwrap().push((session, url.to_string()));
        }

        fn dismiss(&self, session: SessionId) {
            self.dismissed.lock().unwrap().push(session);
        }
    }

    struct Harness {
        coordinator: NavigationCoordinator,
        flags: SharedFlags,
        ready: Arc<AtomicUsize>,
        opener: FakeOpener,
        loader: FakeLoader,
        host: FakeHost,
    }

    fn harness_with(opener: FakeOpener, loader: FakeLoader) -> Harness {
        let flags = PersistedFlags::in_memory().into_shared();
        let ready = Arc::new(AtomicUsize::new(0));
        let host = FakeHost::default();
        let counter = Arc::clone(&ready);
        let coordinator = NavigationCoordinator::new(
            &GamepackConfig::default(),
            Arc::clone(&flags),
            opener.clone(),
            loader.clone(),
            host.clone(),
        )
        .with_content_ready_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Harness {
            coordinator,
            flags,
            ready,
            opener,
            loader,
            host,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeOpener::default(), FakeLoader::default())
    }

    fn request(url: &str) -> NavigationRequest {
        NavigationRequest::main_frame(url)
    }

    fn html(url: &str, status: u16) -> NavigationResponse {
        NavigationResponse::new(url, status, Some("text/html"))
    }

    #[test]
    fn test_local_and_blank_urls_allowed() {
        let mut h = harness();
        let c = &mut h.coordinator;
        assert_eq!(c.decide_request(&request("about:blank")), NavigationDecision::Allow);
        assert_eq!(
            c.decide_request(&request("file:///app/index.html")),
            NavigationDecision::Allow
        );
    }

    #[test]
    fn test_sub_frames_always_allowed() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_request(&request("https://track.example.com/catch.php?id=1"));
        let decision =
            c.decide_request(&NavigationRequest::sub_frame("https://cluckgamepack.website/"));
        assert_eq!(decision, NavigationDecision::Allow);
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_catch_marker_detected_and_allowed() {
        for url in [
            "https://track.example.com/catch.php",
            "https://track.example.com/r/catch.php?campaign=7",
            "https://cluckgamepack.website/catch.php",
        ] {
            let mut h = harness();
            assert_eq!(h.coordinator.decide_request(&request(url)), NavigationDecision::Allow);
            assert!(h.coordinator.session().catch_detected);
        }
    }

    #[test]
    fn test_base_domain_after_catch_cancelled_and_signals_once() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_request(&request("https://track.example.com/catch.php"));

        assert_eq!(
            c.decide_request(&request("https://cluckgamepack.website/")),
            NavigationDecision::Cancel
        );
        assert_eq!(
            c.decide_request(&request("https://www.cluckgamepack.website/promo")),
            NavigationDecision::Cancel
        );
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_host_containing_base_domain_counts_as_base() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_request(&request("https://track.example.com/catch.php"));
        assert_eq!(
            c.decide_request(&request("https://cluckgamepack.website.cdn-example.net/")),
            NavigationDecision::Cancel
        );
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);

        c.decide_response(&html("https://cluckgamepack.website.cdn-example.net/land", 200));
        assert!(!c.final_url_saved());
        assert_eq!(h.flags.lock().unwrap().saved_final_url(), None);
    }

    #[test]
    fn test_subdomain_mode_only_matches_subdomains() {
        let config = GamepackConfig {
            base_domain_match: DomainMatch::Subdomain,
            ..GamepackConfig::default()
        };
        let flags = PersistedFlags::in_memory().into_shared();
        let mut c = NavigationCoordinator::new(
            &config,
            Arc::clone(&flags),
            FakeOpener::default(),
            FakeLoader::default(),
            FakeHost::default(),
        );

        c.decide_request(&request("https://track.example.com/catch.php"));
        assert_eq!(
            c.decide_request(&request("https://cluckgamepack.website.cdn-example.net/")),
            NavigationDecision::Allow
        );
        assert_eq!(
            c.decide_request(&request("https://www.cluckgamepack.website/")),
            NavigationDecision::Cancel
        );
    }

    #[test]
    fn test_base_domain_without_catch_allowed() {
        let mut h = harness();
        assert_eq!(
            h.coordinator
                .decide_request(&request("https://cluckgamepack.website/")),
            NavigationDecision::Allow
        );
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_navigation_start_resets_session() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_request(&request("https://track.example.com/catch.php"));
        c.decide_request(&request("https://cluckgamepack.website/"));
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);

        c.navigation_started();
        assert_eq!(c.session(), &NavigationSession::default());
        assert_eq!(
            c.decide_request(&request("https://cluckgamepack.website/")),
            NavigationDecision::Allow
        );

        // A new sequence may signal again
        c.decide_request(&request("https://track.example.com/catch.php"));
        c.decide_request(&request("https://cluckgamepack.website/"));
        assert_eq!(h.ready.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_external_scheme_opened_when_handled() {
        let opener = FakeOpener {
            handles: true,
            ..FakeOpener::default()
        };
        let mut h = harness_with(opener, FakeLoader::default());
        assert_eq!(
            h.coordinator.decide_request(&request("tel:+15551234")),
            NavigationDecision::OpenExternally
        );
        assert_eq!(*h.opener.opened.lock().unwrap(), vec!["tel:+15551234".to_string()]);
    }

    #[test]
    fn test_external_scheme_allowed_when_unhandled() {
        let mut h = harness();
        assert_eq!(
            h.coordinator
                .decide_request(&request("itms-apps://apps.apple.com/app/id1")),
            NavigationDecision::Allow
        );
        assert!(h.opener.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_web_urls_allowed_and_counted() {
        let mut h = harness();
        let c = &mut h.coordinator;
        assert_eq!(
            c.decide_request(&request("https://game.example.com/")),
            NavigationDecision::Allow
        );
        assert_eq!(
            c.decide_request(&request("http://game.example.com/next")),
            NavigationDecision::Allow
        );
        assert_eq!(c.session().redirect_count, 2);
    }

    #[test]
    fn test_unparseable_url_allowed() {
        let mut h = harness();
        assert_eq!(
            h.coordinator.decide_request(&request("::not a url::")),
            NavigationDecision::Allow
        );
    }

    #[test]
    fn test_binary_responses_always_cancelled() {
        let mut h = harness();
        let c = &mut h.coordinator;
        for status in [200, 302, 404, 500] {
            let apk_mime = NavigationResponse::new(
                "https://cdn.example.com/download",
                status,
                Some("application/vnd.android.package-archive"),
            );
            assert_eq!(c.decide_response(&apk_mime), ResponseDecision::Cancel);

            let apk_ext = NavigationResponse::new(
                "https://cdn.example.com/game.apk",
                status,
                Some("text/html"),
            );
            assert_eq!(c.decide_response(&apk_ext), ResponseDecision::Cancel);
        }
        assert!(!c.final_url_saved());
        assert_eq!(c.get_stats().downloads_blocked, 8);
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_final_url_saved_once() {
        let mut h = harness();
        let c = &mut h.coordinator;
        assert_eq!(
            c.decide_response(&html("https://game.example.com/play", 200)),
            ResponseDecision::Allow
        );
        assert_eq!(
            c.decide_response(&html("https://other.example.com/second", 200)),
            ResponseDecision::Allow
        );

        // Even in a new navigation sequence the URL is not rewritten
        c.navigation_started();
        c.decide_response(&html("https://third.example.com/", 204));

        assert!(c.final_url_saved());
        assert_eq!(
            h.flags.lock().unwrap().saved_final_url(),
            Some("https://game.example.com/play")
        );
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_final_url_skips_catch_base_and_failures() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_response(&html("https://track.example.com/catch.php?x=1", 200));
        c.decide_response(&html("https://cluckgamepack.website/", 200));
        c.decide_response(&html("https://game.example.com/missing", 404));
        c.decide_response(&html("https://game.example.com/redirect", 301));
        c.decide_response(&html("about:blank", 200));

        assert!(!c.final_url_saved());
        assert_eq!(h.flags.lock().unwrap().saved_final_url(), None);
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_final_url_without_mime_type() {
        let mut h = harness();
        let response = NavigationResponse::new("https://game.example.com/", 200, None);
        assert_eq!(h.coordinator.decide_response(&response), ResponseDecision::Allow);
        assert!(h.coordinator.final_url_saved());
    }

    #[test]
    fn test_content_ready_fires_once_across_events() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.script_message(ScriptMessage::ContentLoaded);
        c.decide_response(&html("https://game.example.com/", 200));
        c.script_message(ScriptMessage::ContentLoaded);
        c.decide_request(&request("https://track.example.com/catch.php"));
        c.decide_request(&request("https://cluckgamepack.website/"));
        assert_eq!(h.ready.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_navigate_message_handled_once() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.script_message(ScriptMessage::NavigateTo("https://example.com/x".to_string()));
        c.script_message(ScriptMessage::NavigateTo("https://example.com/x".to_string()));
        c.script_message(ScriptMessage::NavigateTo("https://example.com/y".to_string()));
        assert_eq!(
            *h.loader.loaded.lock().unwrap(),
            vec!["https://example.com/x".to_string()]
        );
    }

    #[test]
    fn test_navigate_message_without_remote_url_loads_fallback() {
        let loader = FakeLoader {
            has_fallback: true,
            ..FakeLoader::default()
        };
        let mut h = harness_with(FakeOpener::default(), loader);
        h.coordinator
            .script_message(ScriptMessage::NavigateTo("score:120".to_string()));
        assert!(h.loader.loaded.lock().unwrap().is_empty());
        assert_eq!(h.loader.fallbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_fallback_is_silent() {
        let mut h = harness();
        h.coordinator
            .script_message(ScriptMessage::NavigateTo("not-a-url".to_string()));
        assert!(h.loader.loaded.lock().unwrap().is_empty());
        assert_eq!(h.loader.fallbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_navigate_does_not_consume_guard() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.script_message(ScriptMessage::MalformedNavigate(serde_json::json!(42)));
        c.script_message(ScriptMessage::NavigateTo("https://example.com/x".to_string()));
        assert_eq!(h.loader.loaded.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_popup_lifecycle() {
        let mut h = harness();
        let c = &mut h.coordinator;
        let id = c.popup_requested(PopupRequest {
            url: "https://pay.example.com/checkout".to_string(),
        });
        assert_eq!(c.open_popups(), 1);
        assert_eq!(
            *h.host.presented.lock().unwrap(),
            vec![(id, "https://pay.example.com/checkout".to_string())]
        );

        c.popup_closed(id);
        c.popup_closed(id);
        assert_eq!(c.open_popups(), 0);
        assert_eq!(*h.host.dismissed.lock().unwrap(), vec![id]);
    }

    #[test]
    fn test_navigation_failure_changes_nothing() {
        let mut h = harness();
        let c = &mut h.coordinator;
        c.decide_request(&request("https://track.example.com/catch.php"));
        c.navigation_failed("https://game.example.com/", "timed out");
        assert!(c.session().catch_detected);
        assert!(!c.final_url_saved());
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
    }
}

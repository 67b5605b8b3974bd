//! Web view wiring
//!
//! Translates wry's callbacks into [`BrowserDelegate`] calls on the shared
//! navigation coordinator. wry only reports a subset of the engine's events:
//!
//! - the navigation handler is treated as a main-frame request
//! - a finished page load stands in for a successful HTML response
//! - a started download stands in for a binary response and is always
//!   refused once the filter has counted it
//! - new-window requests become popup sessions presented in their own window

use crate::events::UserEvent;
use crate::ipc::{IpcMessage, ShellMessage};
use cluck_core::types::{NavigationRequest, NavigationResponse, PopupRequest, SessionId};
use cluck_core::GamepackResult;
use cluck_navigation::{
    BrowserDelegate, ContentLoader, NavigationCoordinator, PresentationHost, SCRIPT_BRIDGE,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tao::event_loop::EventLoopProxy;
use tracing::{debug, error, info, warn};
use url::Url;
use wry::dpi::{LogicalPosition, LogicalSize};
use wry::{PageLoadEvent, Rect, WebViewBuilder};

/// Coordinator shared between the wry handlers
pub type SharedCoordinator = Arc<Mutex<NavigationCoordinator>>;

/// MIME type reported for downloads, which never carry a real one
const DOWNLOAD_MIME_TYPE: &str = "application/octet-stream";

pub fn lock(coordinator: &SharedCoordinator) -> MutexGuard<'_, NavigationCoordinator> {
    coordinator.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Convert logical position/size to a wry Rect
pub fn make_rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect {
        position: LogicalPosition::new(x, y).into(),
        size: LogicalSize::new(width, height).into(),
    }
}

/// Loads content by posting to the event loop, which owns the web view
pub struct ProxyLoader {
    proxy: EventLoopProxy<UserEvent>,
}

impl ProxyLoader {
    pub fn new(proxy: EventLoopProxy<UserEvent>) -> Self {
        Self { proxy }
    }
}

impl ContentLoader for ProxyLoader {
    fn load_url(&self, url: &Url) {
        let _ = self.proxy.send_event(UserEvent::LoadUrl(url.to_string()));
    }

    fn load_fallback(&self) -> GamepackResult<()> {
        let _ = self.proxy.send_event(UserEvent::LoadFallback);
        Ok(())
    }
}

/// Presents popup sessions as separate windows created by the event loop
pub struct ProxyPresenter {
    proxy: EventLoopProxy<UserEvent>,
}

impl ProxyPresenter {
    pub fn new(proxy: EventLoopProxy<UserEvent>) -> Self {
        Self { proxy }
    }
}

impl PresentationHost for ProxyPresenter {
    fn present(&self, session: SessionId, url: &str) {
        let _ = self.proxy.send_event(UserEvent::OpenPopup {
            session,
            url: url.to_string(),
        });
    }

    fn dismiss(&self, session: SessionId) {
        let _ = self.proxy.send_event(UserEvent::ClosePopup(session));
    }
}

/// Refuse a download after the coordinator's filter has counted it.
/// Returns the value wry expects from its download handler.
pub fn refuse_download(coordinator: &SharedCoordinator, url: &str) -> bool {
    let response = NavigationResponse::new(url, 200, Some(DOWNLOAD_MIME_TYPE));
    let decision = lock(coordinator).decide_response(&response);
    info!("Download refused ({:?}): {}", decision, url);
    false
}

/// Route one IPC body. Script messages go to the coordinator; shell messages
/// are returned for the event loop.
pub fn dispatch_ipc(coordinator: &SharedCoordinator, body: &str) -> Option<ShellMessage> {
    match IpcMessage::parse(body) {
        Ok(IpcMessage::Shell(message)) => Some(message),
        Ok(IpcMessage::Script(script)) => {
            lock(coordinator).script_message(script);
            None
        }
        Err(e) => {
            error!("Failed to parse IPC: {}", e);
            None
        }
    }
}

/// Handlers every view shares: request policy, download block and the
/// script bridge.
fn with_shared_policy<'a>(
    builder: WebViewBuilder<'a>,
    coordinator: &SharedCoordinator,
    proxy: &EventLoopProxy<UserEvent>,
    user_agent: &'a str,
) -> WebViewBuilder<'a> {
    let nav_coordinator = Arc::clone(coordinator);
    let download_coordinator = Arc::clone(coordinator);
    let ipc_coordinator = Arc::clone(coordinator);
    let ipc_proxy = proxy.clone();

    builder
        .with_user_agent(user_agent)
        .with_devtools(cfg!(debug_assertions))
        .with_initialization_script(SCRIPT_BRIDGE)
        .with_navigation_handler(move |url| {
            debug!("Navigating to: {}", url);
            lock(&nav_coordinator)
                .decide_request(&NavigationRequest::main_frame(url))
                .proceeds()
        })
        .with_download_started_handler(move |url, _suggested_path| {
            refuse_download(&download_coordinator, &url)
        })
        .with_ipc_handler(move |message| {
            if let Some(ShellMessage::PrivacyAccepted) =
                dispatch_ipc(&ipc_coordinator, message.body())
            {
                let _ = ipc_proxy.send_event(UserEvent::PrivacyAccepted);
            }
        })
}

/// Builder for the main content view with every handler routed through the
/// coordinator.
pub fn governed_builder<'a>(
    coordinator: &SharedCoordinator,
    proxy: &EventLoopProxy<UserEvent>,
    user_agent: &'a str,
) -> WebViewBuilder<'a> {
    let load_coordinator = Arc::clone(coordinator);
    let popup_coordinator = Arc::clone(coordinator);

    with_shared_policy(WebViewBuilder::new(), coordinator, proxy, user_agent)
        .with_on_page_load_handler(move |event, url| match event {
            PageLoadEvent::Started => {
                lock(&load_coordinator).navigation_started();
            }
            PageLoadEvent::Finished => {
                let response = NavigationResponse::new(url, 200, Some("text/html"));
                lock(&load_coordinator).decide_response(&response);
            }
        })
        .with_new_window_req_handler(move |url| {
            let session = lock(&popup_coordinator).popup_requested(PopupRequest { url });
            debug!("New window request moved to popup session {:?}", session);
            false
        })
}

/// Builder for a popup window's view. It shares the content view's policy;
/// further window requests are refused.
pub fn popup_builder<'a>(
    coordinator: &SharedCoordinator,
    proxy: &EventLoopProxy<UserEvent>,
    url: &'a str,
    user_agent: &'a str,
) -> WebViewBuilder<'a> {
    with_shared_policy(WebViewBuilder::new().with_url(url), coordinator, proxy, user_agent)
        .with_new_window_req_handler(|url| {
            warn!("Nested popup refused: {}", url);
            false
        })
}

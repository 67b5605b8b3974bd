//! Cluck Gamepack - Main Application Entry Point
//!
//! One window with two stacked web views:
//! - Content WebView: the game (or the onboarding page on first launch)
//! - Splash WebView: covers the content until launch has settled
//!
//! Popups requested by the game open in their own windows.

mod events;
mod ipc;
mod launch;
mod platform;
mod webview;

use cluck_consent::{LifecycleEvent, LifecycleEvents, PermissionResolver};
use cluck_core::types::SessionId;
use cluck_core::{
    ConsentConfig, GamepackConfig, GamepackError, GamepackResult, PersistedFlags, SharedFlags,
};
use cluck_navigation::{BrowserDelegate, NavigationCoordinator};
use events::UserEvent;
use launch::{LaunchGate, LaunchPlan, LaunchRoute, LaunchSignal};
use platform::{DesktopNotifications, LoggingRegistrar, SystemOpener};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tao::{
    dpi::LogicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy},
    window::{Window, WindowBuilder},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use webview::{governed_builder, lock, make_rect, popup_builder, ProxyLoader, ProxyPresenter};
use wry::WebView;

// Embedded UI assets
const SPLASH_HTML: &str = include_str!("ui/splash.html");
const PRIVACY_HTML: &str = include_str!("ui/privacy.html");
const FALLBACK_HTML: &str = include_str!("ui/index.html");

/// Forget the stored push consent before requesting it again
const RESET_CONSENT_ARG: &str = "--reset-consent";

const WINDOW_TITLE: &str = "Cluck Gamepack";

/// A popup session's window. The web view is dropped before its window.
struct PopupWindow {
    _webview: WebView,
    window: Window,
}

fn main() {
    init_logging();

    info!("Starting Cluck Gamepack {}...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        error!("Failed to start: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging with log compatibility
fn init_logging() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to set log tracer: {}", e);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }
}

fn run() -> GamepackResult<()> {
    let config = GamepackConfig::load_default().unwrap_or_else(|e| {
        error!("Failed to load config, using defaults: {}", e);
        GamepackConfig::default()
    });
    info!("Data directory: {}", config.data_dir.display());

    let flags = PersistedFlags::load(config.flags_path()).into_shared();
    let plan = LaunchPlan::from_flags(
        &flags.lock().unwrap_or_else(PoisonError::into_inner),
        &config,
    );
    info!("Launch route: {:?} (home: {})", plan.route, plan.home_url);

    let mut reset_consent = std::env::args().any(|arg| arg == RESET_CONSENT_ARG);

    // Create the event loop with custom user events
    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let window = WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(430.0, 932.0))
        .build(&event_loop)
        .map_err(|e| GamepackError::platform(format!("Failed to create window: {}", e)))?;
    let main_window_id = window.id();

    let ready_proxy = proxy.clone();
    let coordinator = Arc::new(Mutex::new(
        NavigationCoordinator::new(
            &config,
            Arc::clone(&flags),
            SystemOpener,
            ProxyLoader::new(proxy.clone()),
            ProxyPresenter::new(proxy.clone()),
        )
        .with_content_ready_handler(move || {
            let _ = ready_proxy.send_event(UserEvent::ContentReady);
        }),
    ));

    // === CONTENT WEBVIEW (created first, below the splash) ===
    let content_builder = governed_builder(&coordinator, &proxy, &config.user_agent)
        .with_bounds(full_bounds(&window));
    let content_builder = match plan.route {
        LaunchRoute::Privacy => content_builder.with_html(PRIVACY_HTML),
        LaunchRoute::Home => content_builder.with_url(plan.home_url.as_str()),
    };
    let content = content_builder
        .build_as_child(&window)
        .map_err(|e| GamepackError::webview(format!("Failed to create content view: {}", e)))?;

    // === SPLASH WEBVIEW (on top until the launch gate opens) ===
    let splash = wry::WebViewBuilder::new()
        .with_html(SPLASH_HTML)
        .with_bounds(full_bounds(&window))
        .build_as_child(&window)
        .map_err(|e| GamepackError::webview(format!("Failed to create splash view: {}", e)))?;

    info!("Web views created");

    let mut gate = LaunchGate::new(plan.route);
    start_splash_timer(proxy.clone(), config.splash_min_duration());

    let lifecycle = LifecycleEvents::new();
    let mut consent_started = false;
    if plan.route == LaunchRoute::Home {
        start_content_timer(proxy.clone(), config.content_timeout());
        start_consent(
            &flags,
            &lifecycle,
            &config.consent,
            std::mem::take(&mut reset_consent),
            proxy.clone(),
        );
        consent_started = true;
    }

    let mut popups: HashMap<SessionId, PopupWindow> = HashMap::new();

    // Run the event loop
    event_loop.run(move |event, event_loop_target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::Suspended => {
                info!("App moved to background");
                lifecycle.emit(LifecycleEvent::Background);
            }
            Event::Resumed => {
                lifecycle.emit(LifecycleEvent::Foreground);
            }
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                window_id,
                ..
            } => {
                if window_id == main_window_id {
                    info!("Main window close requested, shutting down...");
                    *control_flow = ControlFlow::Exit;
                } else if let Some(session) = popups
                    .iter()
                    .find(|(_, popup)| popup.window.id() == window_id)
                    .map(|(session, _)| *session)
                {
                    lock(&coordinator).popup_closed(session);
                }
            }
            Event::WindowEvent {
                event: WindowEvent::Resized(_),
                window_id,
                ..
            } if window_id == main_window_id => {
                for view in [&content, &splash] {
                    if let Err(e) = view.set_bounds(full_bounds(&window)) {
                        warn!("Failed to resize web view: {}", e);
                    }
                }
            }
            Event::UserEvent(user_event) => match user_event {
                UserEvent::LoadUrl(url) => {
                    info!("Loading content: {}", url);
                    if let Err(e) = content.load_url(&url) {
                        error!("Failed to load {}: {}", url, e);
                    }
                }
                UserEvent::LoadFallback => {
                    info!("Loading fallback page");
                    if let Err(e) = content.load_html(FALLBACK_HTML) {
                        error!("Failed to load fallback page: {}", e);
                    }
                }
                UserEvent::OpenPopup { session, url } => {
                    match open_popup(
                        event_loop_target,
                        &coordinator,
                        &proxy,
                        &url,
                        &config.user_agent,
                    ) {
                        Ok(popup) => {
                            popups.insert(session, popup);
                        }
                        Err(e) => {
                            error!("Failed to open popup {}: {}", url, e);
                            lock(&coordinator).popup_closed(session);
                        }
                    }
                }
                UserEvent::ClosePopup(session) => {
                    if popups.remove(&session).is_some() {
                        info!("Popup {:?} closed", session);
                    }
                }
                UserEvent::ContentReady => {
                    mark_gate(&mut gate, LaunchSignal::ContentReady, &splash);
                }
                UserEvent::ConsentSettled(outcome) => {
                    info!("Push consent settled: {:?}", outcome);
                    mark_gate(&mut gate, LaunchSignal::ConsentSettled, &splash);
                }
                UserEvent::ContentTimedOut => {
                    if !gate.is_open() {
                        warn!("No content-ready signal in time, showing content anyway");
                    }
                    mark_gate(&mut gate, LaunchSignal::ContentTimedOut, &splash);
                }
                UserEvent::SplashElapsed => {
                    mark_gate(&mut gate, LaunchSignal::SplashElapsed, &splash);
                }
                UserEvent::PrivacyAccepted => {
                    if consent_started {
                        return;
                    }
                    info!("Privacy accepted");

                    if let Err(e) = flags
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .set_first_open_app(false)
                    {
                        error!("Failed to persist onboarding state: {}", e);
                    }

                    gate = LaunchGate::after_onboarding();
                    if let Err(e) = splash.set_visible(true) {
                        warn!("Failed to show splash: {}", e);
                    }
                    if let Err(e) = content.load_url(&plan.home_url) {
                        error!("Failed to load {}: {}", plan.home_url, e);
                    }
                    start_content_timer(proxy.clone(), config.content_timeout());

                    start_consent(
                        &flags,
                        &lifecycle,
                        &config.consent,
                        std::mem::take(&mut reset_consent),
                        proxy.clone(),
                    );
                    consent_started = true;
                }
            },
            _ => {}
        }
    })
}

/// Logical bounds covering the whole window
fn full_bounds(window: &Window) -> wry::Rect {
    let size = window.inner_size().to_logical::<f64>(window.scale_factor());
    make_rect(0.0, 0.0, size.width, size.height)
}

fn mark_gate(gate: &mut LaunchGate, signal: LaunchSignal, splash: &WebView) {
    if gate.mark(signal) {
        info!("Launch settled, hiding splash");
        if let Err(e) = splash.set_visible(false) {
            warn!("Failed to hide splash: {}", e);
        }
    }
}

fn start_splash_timer(proxy: EventLoopProxy<UserEvent>, duration: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        let _ = proxy.send_event(UserEvent::SplashElapsed);
    });
}

/// Stop waiting for the content-ready signal after `timeout`
fn start_content_timer(proxy: EventLoopProxy<UserEvent>, timeout: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(timeout);
        let _ = proxy.send_event(UserEvent::ContentTimedOut);
    });
}

/// Resolve push consent on a background thread with its own runtime
fn start_consent(
    flags: &SharedFlags,
    lifecycle: &LifecycleEvents,
    settings: &ConsentConfig,
    reset: bool,
    proxy: EventLoopProxy<UserEvent>,
) {
    let settled_proxy = proxy.clone();
    let mut resolver = PermissionResolver::new(
        DesktopNotifications,
        LoggingRegistrar,
        Arc::clone(flags),
        lifecycle.clone(),
        settings,
    )
    .with_settled_handler(move |outcome| {
        let _ = settled_proxy.send_event(UserEvent::ConsentSettled(outcome));
    });

    if reset {
        resolver.reset();
    }

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start consent runtime: {}", e);
                let _ = proxy.send_event(UserEvent::ConsentSettled(resolver.outcome()));
                return;
            }
        };

        let outcome = runtime.block_on(resolver.request_if_needed());
        debug!("Consent task finished with {:?}", outcome);
    });
}

fn open_popup(
    target: &tao::event_loop::EventLoopWindowTarget<UserEvent>,
    coordinator: &webview::SharedCoordinator,
    proxy: &EventLoopProxy<UserEvent>,
    url: &str,
    user_agent: &str,
) -> GamepackResult<PopupWindow> {
    let window = WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(LogicalSize::new(430.0, 700.0))
        .build(target)
        .map_err(|e| GamepackError::platform(e.to_string()))?;

    let webview = popup_builder(coordinator, proxy, url, user_agent)
        .build(&window)
        .map_err(|e| GamepackError::webview(e.to_string()))?;

    info!("Popup opened: {}", url);
    Ok(PopupWindow {
        _webview: webview,
        window,
    })
}

//! Platform adapters
//!
//! OS-facing implementations of the collaborator traits: handing URLs to the
//! system, the notification permission API and remote notification
//! registration.

use cluck_consent::{NotificationAuthority, RemoteRegistrar};
use cluck_core::types::AuthorizationStatus;
use cluck_core::{GamepackError, GamepackResult};
use cluck_navigation::ExternalOpener;
use std::future::Future;
use std::process::Command;
use tracing::{debug, info};
use url::Url;

/// Schemes that only make sense inside a web view
const INTERNAL_SCHEMES: &[&str] = &["javascript", "data", "blob", "file", "about"];

const NO_ARGS: &[&str] = &[];
const WINDOWS_START_ARGS: &[&str] = &["/C", "start", ""];

/// Program and leading arguments used to hand a URL to the OS
fn launcher() -> Option<(&'static str, &'static [&'static str])> {
    if cfg!(target_os = "macos") {
        Some(("open", NO_ARGS))
    } else if cfg!(target_os = "windows") {
        Some(("cmd", WINDOWS_START_ARGS))
    } else if cfg!(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        Some(("xdg-open", NO_ARGS))
    } else {
        None
    }
}

/// Opens non-web URLs with the system URL handler
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn can_open(&self, url: &Url) -> bool {
        !INTERNAL_SCHEMES.contains(&url.scheme()) && launcher().is_some()
    }

    fn open(&self, url: &Url) -> GamepackResult<()> {
        let (program, args) = launcher()
            .ok_or_else(|| GamepackError::platform("No URL launcher on this platform"))?;
        debug!("Opening external URL: {}", url);

        Command::new(program)
            .args(args)
            .arg(url.as_str())
            .spawn()
            .map_err(|e| GamepackError::platform(format!("{}: {}", url, e)))?;

        Ok(())
    }
}

/// Notification permission on platforms without a permission prompt:
/// notifications are always authorized.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifications;

impl NotificationAuthority for DesktopNotifications {
    fn request_authorization(&self) -> impl Future<Output = GamepackResult<bool>> + Send {
        std::future::ready(Ok(true))
    }

    fn authorization_status(
        &self,
    ) -> impl Future<Output = GamepackResult<AuthorizationStatus>> + Send {
        std::future::ready(Ok(AuthorizationStatus::Authorized))
    }
}

/// Remote notification registration; desktop builds have no push service so
/// this only records the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRegistrar;

impl RemoteRegistrar for LoggingRegistrar {
    fn register_for_remote_notifications(&self) {
        info!("Registering for remote notifications");
    }
}

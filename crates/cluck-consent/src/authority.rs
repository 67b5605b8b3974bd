//! OS notification permission collaborators

use cluck_core::types::AuthorizationStatus;
use cluck_core::GamepackResult;
use std::future::Future;

/// The platform's notification permission API.
///
/// Both operations are single shot; the resolver layers polling and
/// timeouts on top.
pub trait NotificationAuthority: Send + Sync {
    /// Show the permission prompt. Resolves with whether permission was
    /// granted once the user answers; may never resolve if the prompt is
    /// dismissed without an answer.
    fn request_authorization(&self) -> impl Future<Output = GamepackResult<bool>> + Send;

    /// Query the current permission status
    fn authorization_status(
        &self,
    ) -> impl Future<Output = GamepackResult<AuthorizationStatus>> + Send;
}

/// Registers the device for remote notifications after permission is granted
pub trait RemoteRegistrar: Send + Sync {
    fn register_for_remote_notifications(&self);
}

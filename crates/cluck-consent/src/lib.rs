//! Push permission resolution
//!
//! The OS reports "allowed" and "denied" but says nothing when the user
//! leaves the system prompt through the app switcher or the lock screen.
//! [`PermissionResolver`] combines the prompt answer, periodic status polls
//! and app lifecycle transitions into one terminal [`ConsentOutcome`].
//!
//! [`ConsentOutcome`]: cluck_core::types::ConsentOutcome

pub mod authority;
pub mod lifecycle;
pub mod resolver;

pub use authority::{NotificationAuthority, RemoteRegistrar};
pub use lifecycle::{LifecycleEvent, LifecycleEvents, LifecycleSubscription};
pub use resolver::PermissionResolver;

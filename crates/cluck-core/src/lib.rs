//! Cluck Gamepack Core Library
//!
//! This crate provides shared types, errors, configuration and the persisted
//! flag store used by the navigation coordinator, the consent resolver and the
//! application shell.

pub mod config;
pub mod error;
pub mod flags;
pub mod types;

pub use config::{ConsentConfig, DomainMatch, GamepackConfig};
pub use error::{GamepackError, GamepackResult};
pub use flags::{PersistedFlags, SharedFlags};

//! IPC module for the gamepack shell
//!
//! Pages post `{"name": ..., "body": ...}` through the bridge script. The
//! bundled onboarding page talks to the shell itself; everything else is a
//! script message for the navigation coordinator.

use cluck_core::GamepackResult;
use cluck_navigation::{RawScriptMessage, ScriptMessage};

/// Posted by the bundled privacy page when the user accepts
pub const PRIVACY_ACCEPTED_MESSAGE: &str = "privacyAccepted";

/// Messages handled by the shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellMessage {
    PrivacyAccepted,
}

/// IPC message from page script to Rust
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage {
    Shell(ShellMessage),
    Script(ScriptMessage),
}

impl IpcMessage {
    pub fn parse(body: &str) -> GamepackResult<Self> {
        let raw = RawScriptMessage::parse(body)?;
        Ok(match raw.name.as_str() {
            PRIVACY_ACCEPTED_MESSAGE => Self::Shell(ShellMessage::PrivacyAccepted),
            _ => Self::Script(raw.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_message_goes_to_shell() {
        let msg = IpcMessage::parse(r#"{"name":"privacyAccepted"}"#).unwrap();
        assert_eq!(msg, IpcMessage::Shell(ShellMessage::PrivacyAccepted));
    }

    #[test]
    fn test_script_messages_go_to_coordinator() {
        let msg =
            IpcMessage::parse(r#"{"name":"iosListener","body":"https://example.com/x"}"#).unwrap();
        assert_eq!(
            msg,
            IpcMessage::Script(ScriptMessage::NavigateTo("https://example.com/x".to_string()))
        );

        let msg = IpcMessage::parse(r#"{"name":"contentLoaded","body":null}"#).unwrap();
        assert_eq!(msg, IpcMessage::Script(ScriptMessage::ContentLoaded));
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(IpcMessage::parse("{").is_err());
    }
}

//! Script bridge between page script and the coordinator
//!
//! Pages written for the iOS build post to
//! `window.webkit.messageHandlers.<name>.postMessage(body)`. The bridge script
//! installs handlers with those names and forwards each call through the web
//! view IPC channel as `{"name": ..., "body": ...}`.

use cluck_core::{GamepackError, GamepackResult};
use serde::Deserialize;
use serde_json::Value;

/// Message name carrying a URL the page wants the shell to load
pub const NAVIGATE_MESSAGE: &str = "iosListener";

/// Message name signalling the page considers its content ready
pub const CONTENT_LOADED_MESSAGE: &str = "contentLoaded";

/// Initialization script injected into every page
pub const SCRIPT_BRIDGE: &str = r#"
(function() {
    const names = ['iosListener', 'contentLoaded'];
    const post = (name, body) => window.ipc.postMessage(
        JSON.stringify({ name, body: body === undefined ? null : body })
    );

    window.webkit = window.webkit || {};
    window.webkit.messageHandlers = window.webkit.messageHandlers || {};
    for (const name of names) {
        if (!window.webkit.messageHandlers[name]) {
            window.webkit.messageHandlers[name] = {
                postMessage: (body) => post(name, body)
            };
        }
    }

    window.cluck = { post };
})();
"#;

/// Raw `{name, body}` envelope as posted by the bridge
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawScriptMessage {
    pub name: String,
    #[serde(default)]
    pub body: Value,
}

impl RawScriptMessage {
    pub fn parse(json: &str) -> GamepackResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| GamepackError::webview(format!("Malformed script message: {}", e)))
    }
}

/// Script messages understood by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptMessage {
    /// `iosListener` with a string payload
    NavigateTo(String),
    /// `iosListener` whose payload is not a string
    MalformedNavigate(Value),
    /// `contentLoaded`
    ContentLoaded,
    /// Any other handler name
    Unknown(String),
}

impl ScriptMessage {
    pub fn new(name: &str, body: Value) -> Self {
        match name {
            NAVIGATE_MESSAGE => match body {
                Value::String(url) => Self::NavigateTo(url),
                other => Self::MalformedNavigate(other),
            },
            CONTENT_LOADED_MESSAGE => Self::ContentLoaded,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<RawScriptMessage> for ScriptMessage {
    fn from(raw: RawScriptMessage) -> Self {
        Self::new(&raw.name, raw.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigate() {
        let raw = RawScriptMessage::parse(
            r#"{"name":"iosListener","body":"https://example.com/x"}"#,
        )
        .unwrap();
        assert_eq!(
            ScriptMessage::from(raw),
            ScriptMessage::NavigateTo("https://example.com/x".to_string())
        );
    }

    #[test]
    fn test_parse_content_loaded_without_body() {
        let raw = RawScriptMessage::parse(r#"{"name":"contentLoaded"}"#).unwrap();
        assert_eq!(raw.body, Value::Null);
        assert_eq!(ScriptMessage::from(raw), ScriptMessage::ContentLoaded);
    }

    #[test]
    fn test_non_string_navigate_payload() {
        let message = ScriptMessage::new(NAVIGATE_MESSAGE, serde_json::json!({ "score": 10 }));
        assert!(matches!(message, ScriptMessage::MalformedNavigate(_)));
    }

    #[test]
    fn test_unknown_name() {
        let message = ScriptMessage::new("somethingElse", Value::Null);
        assert_eq!(message, ScriptMessage::Unknown("somethingElse".to_string()));
    }

    #[test]
    fn test_malformed_json() {
        assert!(RawScriptMessage::parse("not json").is_err());
        assert!(RawScriptMessage::parse(r#"{"body":1}"#).is_err());
    }

    #[test]
    fn test_bridge_script_installs_both_handlers() {
        assert!(SCRIPT_BRIDGE.contains(NAVIGATE_MESSAGE));
        assert!(SCRIPT_BRIDGE.contains(CONTENT_LOADED_MESSAGE));
        assert!(SCRIPT_BRIDGE.contains("window.ipc.postMessage"));
    }
}

//! Wire protocol between the relay and its subscriber.
//!
//! Every frame is `{action, data}`. The same serde types produce both the
//! text (JSON) and the binary (bincode) encodings.

use crate::upstream::{AvoidElement, NavigationMode};
use nav_extractor::{CodecError, DiffPatch, Format, NavigationData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Hello,
    Status,
    Error,
    Resync,
    Set,
    Get,
    Start,
    Stop,
    /// Any action name this relay does not know
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Hello => "hello",
            Action::Status => "status",
            Action::Error => "error",
            Action::Resync => "resync",
            Action::Set => "set",
            Action::Get => "get",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotAuthorized,
    NotSupported,
    NoNavigationInProgress,
    NoNotificationsAccess,
    InvalidRequest,
    InvalidAction,
    Internal,
}

/// Options exchanged through `get` and `set`; absent fields are left unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationOptions {
    pub debounce_threshold_millis: Option<i64>,
    pub use_binary_format: Option<bool>,
}

impl NavigationOptions {
    pub fn current(threshold: Duration, format: Format) -> Self {
        Self {
            debounce_threshold_millis: Some(threshold.as_millis() as i64),
            use_binary_format: Some(format.is_binary()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    Hello {
        message: String,
        version: String,
        app_id: String,
        app_version: String,
    },
    Message {
        text: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    NavigationStart {
        destination: String,
        #[serde(default)]
        mode: NavigationMode,
        #[serde(default)]
        avoid: BTreeSet<AvoidElement>,
    },
    NavigationState(Box<NavigationData>),
    NavigationUpdate(DiffPatch),
    Options(NavigationOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub action: Action,
    #[serde(default)]
    pub data: Payload,
}

impl Frame {
    pub fn new(action: Action, data: Payload) -> Self {
        Self { action, data }
    }

    pub fn hello(app_id: &str, app_version: &str) -> Self {
        Self::new(
            Action::Hello,
            Payload::Hello {
                message: "Hello, ready to navigate you!".to_string(),
                version: PROTOCOL_VERSION.to_string(),
                app_id: app_id.to_string(),
                app_version: app_version.to_string(),
            },
        )
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(
            Action::Error,
            Payload::Error {
                kind,
                message: message.into(),
            },
        )
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(Action::Status, Payload::Message { text: text.into() })
    }

    pub fn snapshot(data: &NavigationData) -> Self {
        Self::new(Action::Status, Payload::NavigationState(Box::new(data.clone())))
    }

    pub fn update(patch: DiffPatch) -> Self {
        Self::new(Action::Status, Payload::NavigationUpdate(patch))
    }

    pub fn options(options: NavigationOptions) -> Self {
        Self::new(Action::Get, Payload::Options(options))
    }

    /// Error kind carried by this frame, if it is an error
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.data {
            Payload::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn encode(&self, format: Format) -> Result<Vec<u8>, CodecError> {
        format.encode(self)
    }

    pub fn to_text(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(bytes: &[u8], format: Format) -> Result<Self, CodecError> {
        format.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hello_text_layout() {
        let json: serde_json::Value =
            serde_json::from_str(&Frame::hello("nav-relay", "0.1.0").to_text().unwrap()).unwrap();
        assert_eq!(json["action"], "hello");
        assert_eq!(json["data"]["hello"]["version"], PROTOCOL_VERSION);
        assert_eq!(json["data"]["hello"]["appId"], "nav-relay");
    }

    #[test]
    fn test_error_kind_names() {
        let text = Frame::error(ErrorKind::NoNavigationInProgress, "none").to_text().unwrap();
        assert!(text.contains(r#""kind":"no_navigation_in_progress""#));
    }

    #[test]
    fn test_missing_data_defaults_to_none() {
        let frame = Frame::decode(br#"{"action":"resync"}"#, Format::Text).unwrap();
        assert_eq!(frame, Frame::new(Action::Resync, Payload::None));
    }

    #[test]
    fn test_unknown_action_decodes() {
        let frame = Frame::decode(br#"{"action":"teleport","data":"none"}"#, Format::Text).unwrap();
        assert_eq!(frame.action, Action::Unknown);
    }

    #[test]
    fn test_partial_options() {
        let frame = Frame::decode(
            br#"{"action":"set","data":{"options":{"useBinaryFormat":true}}}"#,
            Format::Text,
        )
        .unwrap();
        assert_eq!(
            frame.data,
            Payload::Options(NavigationOptions {
                debounce_threshold_millis: None,
                use_binary_format: Some(true),
            })
        );
    }

    #[test]
    fn test_navigation_start_defaults() {
        let frame = Frame::decode(
            br#"{"action":"start","data":{"navigationStart":{"destination":"Home"}}}"#,
            Format::Text,
        )
        .unwrap();
        match frame.data {
            Payload::NavigationStart { mode, avoid, .. } => {
                assert_eq!(mode, NavigationMode::Driving);
                assert!(avoid.is_empty());
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_binary_round_trip() {
        let frames = vec![
            Frame::hello("nav-relay", "0.1.0"),
            Frame::error(ErrorKind::NotAuthorized, "busy"),
            Frame::snapshot(&NavigationData::default()),
            Frame::options(NavigationOptions::current(Duration::from_millis(250), Format::Binary)),
        ];
        for frame in frames {
            let bytes = frame.encode(Format::Binary).unwrap();
            assert_eq!(Frame::decode(&bytes, Format::Binary).unwrap(), frame);
        }
    }
}

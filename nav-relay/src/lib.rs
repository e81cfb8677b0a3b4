//! Navigation Relay
//!
//! Serves parsed navigation state to a single WebSocket subscriber. The first
//! valid state is sent as a full snapshot; later changes are debounced and sent
//! as patches against what the subscriber last received.
//!
//! ## Architecture
//!
//! ```text
//! capture (stdin JSON lines) ──► StdioUpstream ──► SyncEngine ──► server ──► subscriber
//!            ▲                                        │
//!            └──────── start/stop commands (stdout) ◄─┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;
pub mod stdio;
pub mod upstream;

pub use config::Config;
pub use engine::{Admission, Inbound, Outbound, SessionState, Subscriber, SyncEngine, SyncSettings};
pub use error::{RelayError, UpstreamError};
pub use protocol::{Action, ErrorKind, Frame, NavigationOptions, Payload, PROTOCOL_VERSION};
pub use stdio::{StdioUpstream, UpstreamCommand, UpstreamEvent};
pub use upstream::{navigation_uri, AvoidElement, NavigationMode, Upstream};

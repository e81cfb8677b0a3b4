//! The upstream collaborator: whatever captures navigation notifications and
//! can drive the navigation app.

use crate::error::UpstreamError;
use nav_extractor::RawNotification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Scheme of the navigation-start URI understood by the navigation app
const NAVIGATION_SCHEME: &str = "google.navigation";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    #[default]
    Driving,
    Bicycling,
    TwoWheeler,
    Walking,
}

impl NavigationMode {
    pub fn code(self) -> char {
        match self {
            NavigationMode::Driving => 'd',
            NavigationMode::Bicycling => 'b',
            NavigationMode::TwoWheeler => 'l',
            NavigationMode::Walking => 'w',
        }
    }
}

/// Route features to avoid; ordered so the avoid string is stable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidElement {
    Tolls,
    Highways,
    Ferries,
}

impl AvoidElement {
    pub fn code(self) -> char {
        match self {
            AvoidElement::Tolls => 't',
            AvoidElement::Highways => 'h',
            AvoidElement::Ferries => 'f',
        }
    }
}

/// Build `google.navigation:?q=<destination>&mode=<m>[&avoid=<codes>]`
pub fn navigation_uri(destination: &str, mode: NavigationMode, avoid: &BTreeSet<AvoidElement>) -> String {
    let mut uri = format!(
        "{}:?q={}&mode={}",
        NAVIGATION_SCHEME,
        urlencoding::encode(destination),
        mode.code()
    );

    if !avoid.is_empty() {
        let codes: String = avoid.iter().map(|element| element.code()).collect();
        uri.push_str("&avoid=");
        uri.push_str(&codes);
    }

    uri
}

/// Capabilities the sync engine needs from the capture side.
///
/// Calls are short and non-blocking; implementations queue commands rather
/// than waiting on the navigation app.
pub trait Upstream: Send + Sync + 'static {
    /// Whether notifications can currently be read
    fn has_notification_access(&self) -> bool;

    /// The navigation notification currently shown, if any
    fn active_notification(&self) -> Option<RawNotification>;

    fn start_navigation(&self, uri: &str) -> Result<(), UpstreamError>;

    fn stop_navigation(&self) -> Result<(), UpstreamError>;
}

impl<U: Upstream> Upstream for Arc<U> {
    fn has_notification_access(&self) -> bool {
        (**self).has_notification_access()
    }

    fn active_notification(&self) -> Option<RawNotification> {
        (**self).active_notification()
    }

    fn start_navigation(&self, uri: &str) -> Result<(), UpstreamError> {
        (**self).start_navigation(uri)
    }

    fn stop_navigation(&self) -> Result<(), UpstreamError> {
        (**self).stop_navigation()
    }
}

//! Microphone permission tracking
//!
//! The host may provide a [`PermissionQuery`] that reports the microphone
//! permission state and notifies on changes. Without one the state stays
//! `Unknown` and the denial fast-path is skipped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Microphone permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
    #[default]
    Unknown,
}

/// Handle for a registered permission-change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback invoked when the permission state changes
pub type PermissionListener = Arc<dyn Fn(PermissionState) + Send + Sync>;

/// Permission query errors
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Permission queries are not supported on this platform")]
    Unsupported,

    #[error("Permission query failed: {0}")]
    QueryFailed(String),
}

/// Host collaborator reporting microphone permission
pub trait PermissionQuery: Send + Sync {
    /// Current permission state
    fn query(&self) -> Result<PermissionState, PermissionError>;

    /// Register a change listener
    fn subscribe(&self, listener: PermissionListener) -> Result<ListenerId, PermissionError>;

    /// Remove a previously registered listener
    fn unsubscribe(&self, id: ListenerId);
}

/// Browser family, used to tailor permission instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    Safari,
    #[default]
    Other,
}

impl BrowserFamily {
    /// Detect the browser family from a user-agent string
    ///
    /// Order matters: Edge and Chrome both advertise "Chrome", and Chrome
    /// advertises "Safari".
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("edg/") || ua.contains("edge/") {
            BrowserFamily::Edge
        } else if ua.contains("firefox/") || ua.contains("fxios/") {
            BrowserFamily::Firefox
        } else if ua.contains("chrome/") || ua.contains("crios/") || ua.contains("chromium/") {
            BrowserFamily::Chrome
        } else if ua.contains("safari/") {
            BrowserFamily::Safari
        } else {
            BrowserFamily::Other
        }
    }

    /// Instructions for re-enabling microphone access
    pub fn permission_denied_message(&self) -> &'static str {
        match self {
            BrowserFamily::Chrome => {
                "Microphone access is blocked. Click the camera/microphone icon in the address bar, \
                 choose \"Always allow\", then reload the page."
            }
            BrowserFamily::Edge => {
                "Microphone access is blocked. Open Settings > Cookies and site permissions > \
                 Microphone, allow this site, then reload the page."
            }
            BrowserFamily::Firefox => {
                "Microphone access is blocked. Click the microphone icon next to the address bar, \
                 remove the block for this site, then reload the page."
            }
            BrowserFamily::Safari => {
                "Microphone access is blocked. Open Safari > Settings > Websites > Microphone, \
                 set this site to \"Allow\", then reload the page."
            }
            BrowserFamily::Other => {
                "Microphone access is blocked. Allow microphone access for this site in your \
                 browser settings, then reload the page."
            }
        }
    }
}

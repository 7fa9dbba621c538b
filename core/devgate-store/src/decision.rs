//! Check decisions returned to polling clients.

use serde::{Deserialize, Serialize};

/// How often clients should re-check, in seconds.
pub const CHECK_INTERVAL_SECS: u32 = 30;

/// The resolution of a single check against the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The request had no usable device identifier.
    MissingDevice,
    /// The device is on the block list.
    Blocked,
    /// The device has not been classified yet; it is pending review.
    NotAllowed,
    /// The device is on the allow list.
    Allowed,
}

impl CheckOutcome {
    /// Returns true if the client may keep running.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns true if the client should shut itself down.
    #[must_use]
    pub fn force_exit(&self) -> bool {
        !self.is_allowed()
    }

    /// The reason string reported to clients.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingDevice => "missing deviceId",
            Self::Blocked => "blocked",
            Self::NotAllowed => "not allowed",
            Self::Allowed => "",
        }
    }
}

/// A check response as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDecision {
    pub allowed: bool,
    pub force_exit: bool,
    pub interval_sec: u32,
    pub reason: String,
}

impl From<CheckOutcome> for CheckDecision {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            allowed: outcome.is_allowed(),
            force_exit: outcome.force_exit(),
            interval_sec: CHECK_INTERVAL_SECS,
            reason: outcome.reason().to_string(),
        }
    }
}

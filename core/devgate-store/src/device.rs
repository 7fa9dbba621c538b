//! Device identifiers and classifications.
//!
//! A device is identified by an opaque string supplied by the client
//! (usually a stable hardware hash). The only validation applied is that
//! the identifier is non-empty once surrounding whitespace is trimmed.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, trimmed device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parses a device identifier from raw input.
    ///
    /// Leading and trailing whitespace is removed. Fails with
    /// [`StoreError::InvalidInput`] when nothing is left.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidInput("missing deviceId".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The classification of a device. Exactly one applies at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Never observed, or reverted by an operator. Not stored anywhere.
    Unseen,
    /// Observed by a check but not yet classified.
    Pending,
    /// Explicitly approved by an operator.
    Allowed,
    /// Explicitly rejected by an operator.
    Blocked,
}

impl DeviceStatus {
    /// Returns true if an operator has made a decision about this device.
    #[must_use]
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Allowed | Self::Blocked)
    }
}

/// Classification of a single device together with its last check time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    /// The device identifier.
    pub device_id: String,
    /// Current classification.
    pub status: DeviceStatus,
    /// When the device last checked in, if ever.
    pub last_seen: Option<DateTime<Utc>>,
}

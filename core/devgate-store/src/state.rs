//! The authorization state and its transition rules.
//!
//! [`DeviceState`] is a plain value: every transition is a method taking
//! `&mut self`. Locking and persistence live in [`crate::store`], which
//! applies these transitions to a candidate copy and commits it only after
//! the write succeeds.

use crate::decision::CheckOutcome;
use crate::device::{DeviceId, DeviceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The persisted authorization record.
///
/// `allow`, `block` and `pending` are ordered sets: insertion order is kept
/// for display, and an identifier appears at most once in each. They are
/// pairwise disjoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Shared secret the admin API compares credentials against.
    #[serde(default)]
    pub admin_token: String,
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    block: Vec<String>,
    #[serde(default)]
    pending: Vec<String>,
    #[serde(default)]
    last_seen: BTreeMap<String, DateTime<Utc>>,
}

/// A read-only view of the classification lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub allow: Vec<String>,
    pub block: Vec<String>,
    pub pending: Vec<String>,
    pub last_seen: BTreeMap<String, DateTime<Utc>>,
}

impl DeviceState {
    /// Creates an empty state with the given admin token.
    #[must_use]
    pub fn new(admin_token: impl Into<String>) -> Self {
        Self {
            admin_token: admin_token.into(),
            allow: Vec::new(),
            block: Vec::new(),
            pending: Vec::new(),
            last_seen: BTreeMap::new(),
        }
    }

    /// Loads state from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes state to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Resolves a check for `id` at time `now`.
    ///
    /// Always records the check time. An unclassified device is added to the
    /// pending set if it is not already there. Never changes an allow or
    /// block decision.
    pub fn check(&mut self, id: &DeviceId, now: DateTime<Utc>) -> CheckOutcome {
        self.last_seen.insert(id.to_string(), now);

        if contains(&self.block, id) {
            CheckOutcome::Blocked
        } else if contains(&self.allow, id) {
            CheckOutcome::Allowed
        } else {
            insert_unique(&mut self.pending, id);
            CheckOutcome::NotAllowed
        }
    }

    /// Moves `id` onto the allow list.
    pub fn allow(&mut self, id: &DeviceId) {
        remove(&mut self.pending, id);
        remove(&mut self.block, id);
        insert_unique(&mut self.allow, id);
    }

    /// Moves `id` onto the block list.
    pub fn block(&mut self, id: &DeviceId) {
        remove(&mut self.pending, id);
        remove(&mut self.allow, id);
        insert_unique(&mut self.block, id);
    }

    /// Removes `id` from the allow list. Returns false if it was not there.
    pub fn unallow(&mut self, id: &DeviceId) -> bool {
        remove(&mut self.allow, id)
    }

    /// Removes `id` from the block list. Returns false if it was not there.
    pub fn unblock(&mut self, id: &DeviceId) -> bool {
        remove(&mut self.block, id)
    }

    /// Empties the pending set. Returns how many entries were dropped.
    pub fn clear_pending(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        cleared
    }

    /// Current classification of `id`.
    #[must_use]
    pub fn status(&self, id: &DeviceId) -> DeviceStatus {
        if contains(&self.block, id) {
            DeviceStatus::Blocked
        } else if contains(&self.allow, id) {
            DeviceStatus::Allowed
        } else if contains(&self.pending, id) {
            DeviceStatus::Pending
        } else {
            DeviceStatus::Unseen
        }
    }

    /// Last check time recorded for `id`.
    #[must_use]
    pub fn last_seen(&self, id: &DeviceId) -> Option<DateTime<Utc>> {
        self.last_seen.get(id.as_str()).copied()
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow
    }

    pub fn block_list(&self) -> &[String] {
        &self.block
    }

    pub fn pending_list(&self) -> &[String] {
        &self.pending
    }

    /// Copies the classification lists out.
    #[must_use]
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            allow: self.allow.clone(),
            block: self.block.clone(),
            pending: self.pending.clone(),
            last_seen: self.last_seen.clone(),
        }
    }

    /// Returns true if the lists are duplicate-free and pairwise disjoint.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let unique = |list: &[String]| {
            list.iter()
                .enumerate()
                .all(|(i, id)| !list[..i].contains(id))
        };
        unique(&self.allow)
            && unique(&self.block)
            && unique(&self.pending)
            && self.allow.iter().all(|id| !self.block.contains(id))
            && self
                .pending
                .iter()
                .all(|id| !self.allow.contains(id) && !self.block.contains(id))
    }

    /// Repairs a record that breaks the disjointness rules.
    ///
    /// Blocked wins over allowed, classified devices leave pending, and
    /// duplicates keep their first position. Returns true if anything
    /// changed.
    pub fn normalize(&mut self) -> bool {
        let before = self.clone();

        dedup(&mut self.block);
        dedup(&mut self.allow);
        dedup(&mut self.pending);

        let block = self.block.clone();
        self.allow.retain(|id| !block.contains(id));
        let allow = self.allow.clone();
        self.pending
            .retain(|id| !block.contains(id) && !allow.contains(id));

        *self != before
    }
}

impl fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceState")
            .field("admin_token", &"<redacted>")
            .field("allow", &self.allow)
            .field("block", &self.block)
            .field("pending", &self.pending)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

fn contains(list: &[String], id: &DeviceId) -> bool {
    list.iter().any(|entry| entry == id.as_str())
}

fn insert_unique(list: &mut Vec<String>, id: &DeviceId) -> bool {
    if contains(list, id) {
        return false;
    }
    list.push(id.to_string());
    true
}

fn remove(list: &mut Vec<String>, id: &DeviceId) -> bool {
    let len = list.len();
    list.retain(|entry| entry != id.as_str());
    list.len() != len
}

fn dedup(list: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(list.len());
    list.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(id.clone());
            true
        }
    });
}

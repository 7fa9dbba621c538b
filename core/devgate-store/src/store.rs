//! The shared, persisted device store.
//!
//! All operations serialize on one mutex. A mutation clones the current
//! state, applies the transition to the clone, writes the clone to disk and
//! only then commits it, so a failed write leaves memory untouched and a
//! concurrent reader never sees a half-applied transition. The file is read
//! once at open and never again; memory is the source of truth.

use crate::decision::{CheckDecision, CheckOutcome};
use crate::device::{DeviceId, DeviceReport};
use crate::error::StoreResult;
use crate::persist;
use crate::state::{DeviceSnapshot, DeviceState};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Options for opening a [`DeviceStore`].
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Location of the JSON state file.
    pub path: PathBuf,
    /// Admin token to use. When `None`, an existing token is kept or a
    /// random one is generated.
    pub admin_token: Option<String>,
}

impl StoreConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            admin_token: None,
        }
    }

    #[must_use]
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Durable store of device classifications.
#[derive(Debug)]
pub struct DeviceStore {
    path: PathBuf,
    state: Mutex<DeviceState>,
}

impl DeviceStore {
    /// Opens the store at `config.path`, seeding a fresh record if there is
    /// no usable prior state.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let StoreConfig { path, admin_token } = config;
        let admin_token = admin_token.filter(|t| !t.trim().is_empty());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let (state, dirty) = match persist::load(&path)? {
            Some(mut state) => {
                let mut dirty = state.normalize();
                if dirty {
                    warn!("State file {:?} had overlapping lists, repaired", path);
                }
                match admin_token {
                    Some(token) if token != state.admin_token => {
                        info!("Admin token replaced from configuration");
                        state.admin_token = token;
                        dirty = true;
                    }
                    Some(_) => {}
                    None if state.admin_token.is_empty() => {
                        state.admin_token = persist::generate_admin_token();
                        dirty = true;
                    }
                    None => {}
                }
                info!(
                    "Loaded state: {} allowed, {} blocked, {} pending",
                    state.allow_list().len(),
                    state.block_list().len(),
                    state.pending_list().len()
                );
                (state, dirty)
            }
            None => {
                info!("Seeding new state file at {:?}", path);
                let token = admin_token.unwrap_or_else(persist::generate_admin_token);
                (DeviceState::new(token), true)
            }
        };

        if dirty {
            persist::write_atomic(&path, &state)?;
        }

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The admin secret credentials are compared against.
    #[must_use]
    pub fn admin_token(&self) -> String {
        self.lock().admin_token.clone()
    }

    /// Resolves a device check at time `now`.
    ///
    /// An empty identifier yields the "missing deviceId" decision without
    /// touching state.
    pub fn check(&self, device_id: &str, now: DateTime<Utc>) -> StoreResult<CheckDecision> {
        let Ok(id) = DeviceId::parse(device_id) else {
            debug!("Check rejected: missing deviceId");
            return Ok(CheckOutcome::MissingDevice.into());
        };

        let outcome = self.mutate(|state| state.check(&id, now))?;
        debug!("Check {}: {:?}", id, outcome);
        Ok(outcome.into())
    }

    /// Approves a device. Returns the allow list.
    pub fn allow(&self, device_id: &str) -> StoreResult<Vec<String>> {
        let id = DeviceId::parse(device_id)?;
        let list = self.mutate(|state| {
            state.allow(&id);
            state.allow_list().to_vec()
        })?;
        info!("Device allowed: {}", id);
        Ok(list)
    }

    /// Rejects a device. Returns the block list.
    pub fn block(&self, device_id: &str) -> StoreResult<Vec<String>> {
        let id = DeviceId::parse(device_id)?;
        let list = self.mutate(|state| {
            state.block(&id);
            state.block_list().to_vec()
        })?;
        info!("Device blocked: {}", id);
        Ok(list)
    }

    /// Drops a device from the allow list. Returns the allow list.
    pub fn unallow(&self, device_id: &str) -> StoreResult<Vec<String>> {
        let id = DeviceId::parse(device_id)?;
        let (removed, list) = self.mutate(|state| {
            let removed = state.unallow(&id);
            (removed, state.allow_list().to_vec())
        })?;
        if removed {
            info!("Device removed from allow list: {}", id);
        }
        Ok(list)
    }

    /// Drops a device from the block list. Returns the block list.
    pub fn unblock(&self, device_id: &str) -> StoreResult<Vec<String>> {
        let id = DeviceId::parse(device_id)?;
        let (removed, list) = self.mutate(|state| {
            let removed = state.unblock(&id);
            (removed, state.block_list().to_vec())
        })?;
        if removed {
            info!("Device removed from block list: {}", id);
        }
        Ok(list)
    }

    /// Empties the pending set. Returns the (now empty) pending list.
    pub fn clear_pending(&self) -> StoreResult<Vec<String>> {
        let (cleared, list) = self.mutate(|state| {
            let cleared = state.clear_pending();
            (cleared, state.pending_list().to_vec())
        })?;
        info!("Cleared {} pending devices", cleared);
        Ok(list)
    }

    /// Snapshot of all lists and check times.
    #[must_use]
    pub fn list(&self) -> DeviceSnapshot {
        self.lock().snapshot()
    }

    /// Classification of a single device.
    pub fn status(&self, device_id: &str) -> StoreResult<DeviceReport> {
        let id = DeviceId::parse(device_id)?;
        let state = self.lock();
        Ok(DeviceReport {
            status: state.status(&id),
            last_seen: state.last_seen(&id),
            device_id: id.into_inner(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        // Committed state is always whole: a panic can only occur on the candidate copy.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut DeviceState) -> T) -> StoreResult<T> {
        let mut guard = self.lock();
        let mut candidate = guard.clone();
        let out = op(&mut candidate);
        if candidate != *guard {
            persist::write_atomic(&self.path, &candidate)?;
            *guard = candidate;
        }
        Ok(out)
    }
}

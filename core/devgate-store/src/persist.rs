//! On-disk representation of the device state.
//!
//! The whole record is rewritten on every mutation. Writes go to a
//! temporary file in the target directory which is synced and then renamed
//! over the target, so a crash mid-write leaves the previous version intact.

use crate::error::{StoreError, StoreResult};
use crate::state::DeviceState;
use rand::RngCore;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Length of generated admin tokens, in random bytes (hex-encoded on output).
const ADMIN_TOKEN_BYTES: usize = 32;

/// Generates a random hex admin token.
#[must_use]
pub fn generate_admin_token() -> String {
    let mut bytes = [0u8; ADMIN_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Reads a persisted state file.
///
/// Returns `Ok(None)` when there is no usable prior state. A file whose
/// contents are not valid state is moved aside to `<name>.corrupt` so the
/// caller can seed a fresh record without losing the original bytes. Any
/// other read failure (permissions, a directory in the way) is returned.
pub fn load(path: &Path) -> StoreResult<Option<DeviceState>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            warn!("State file {:?} is not UTF-8, starting fresh", path);
            quarantine(path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    match DeviceState::from_json(&contents) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            warn!("State file {:?} is corrupt ({}), starting fresh", path, e);
            quarantine(path);
            Ok(None)
        }
    }
}

/// Atomically replaces `path` with the serialized `state`.
pub fn write_atomic(path: &Path, state: &DeviceState) -> StoreResult<()> {
    let json = state.to_json()?;
    let dir = parent_dir(path);

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
        StoreError::Persistence(format!("failed to create temp file in {dir:?}: {e}"))
    })?;
    write_synced(&mut tmp, json.as_bytes())
        .map_err(|e| StoreError::Persistence(format!("failed to write state: {e}")))?;
    tmp.persist(path).map_err(|e| {
        StoreError::Persistence(format!("failed to replace {path:?}: {}", e.error))
    })?;
    Ok(())
}

/// Path a corrupt state file is moved to.
#[must_use]
pub fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn write_synced(tmp: &mut NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    tmp.write_all(bytes)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()
}

fn quarantine(path: &Path) {
    let target = corrupt_path(path);
    match fs::rename(path, &target) {
        Ok(()) => info!("Moved unreadable state to {:?}", target),
        Err(e) => warn!("Could not move unreadable state aside: {}", e),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

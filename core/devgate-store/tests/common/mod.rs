//! Shared test helpers for store tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use devgate_store::{DeviceStore, StoreConfig};
use std::path::PathBuf;
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "test-admin-token";

/// A store backed by a file in its own temporary directory.
pub struct TestStore {
    pub dir: TempDir,
    pub store: DeviceStore,
}

impl TestStore {
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    /// Opens a second store over the same file.
    pub fn reopen(&self) -> DeviceStore {
        DeviceStore::open(StoreConfig::new(self.path())).unwrap()
    }
}

/// Opens a fresh store with a fixed admin token.
pub fn open_store() -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("state.json")).with_admin_token(TEST_TOKEN);
    let store = DeviceStore::open(config).unwrap();
    TestStore { dir, store }
}

/// A fixed instant, offset by `secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

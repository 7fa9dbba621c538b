//! Device authorization state engine for devgate.
//!
//! Client software periodically checks whether its device may run; an
//! operator maintains allow and block decisions out of band. This crate
//! owns the data model and transition rules:
//!
//! - A device is *unseen*, *pending*, *allowed* or *blocked*, never two at once
//! - A check records the device's last-seen time and queues unknown devices as pending
//! - Operator decisions move a device between lists without leaving residue
//! - Every mutation is persisted atomically before it is acknowledged
//!
//! # Persistence
//!
//! State lives in memory behind a single mutex and is written through to a
//! JSON file on every change. The file is read once at open. A corrupt file
//! is moved aside and replaced by a freshly seeded record.
//!
//! If a write fails, the in-memory change is rolled back and the caller
//! receives [`StoreError::Persistence`].

mod decision;
mod device;
mod error;
pub mod persist;
mod state;
mod store;

pub use decision::{CheckDecision, CheckOutcome, CHECK_INTERVAL_SECS};
pub use device::{DeviceId, DeviceReport, DeviceStatus};
pub use error::{StoreError, StoreResult};
pub use state::{DeviceSnapshot, DeviceState};
pub use store::{DeviceStore, StoreConfig};

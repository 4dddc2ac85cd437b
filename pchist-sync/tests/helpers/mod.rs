//! Test Helper Utilities
//!
//! Shared utilities for testing pchist-sync
#![allow(dead_code)]

pub mod fixtures;
pub mod log_capture;

pub use fixtures::{
    episode_json, fixture_path, history_body, memory_store, record, records, stored_uuids,
    uuids_of,
};
pub use log_capture::{capture_logs, LogCapture};

//! Pocket Casts payload types shared by the sync service and its tests

pub mod types;

pub use types::*;

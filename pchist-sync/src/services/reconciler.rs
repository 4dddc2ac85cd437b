//! History reconciliation
//!
//! Decides which incoming history entries are new by identifier-set
//! exclusion against the persisted records. Pure functions only; the store
//! and pipeline decide when to call them.
//!
//! **Algorithm:**
//! 1. Collect the identifiers of the existing records into a set
//! 2. Walk the incoming batch in its delivered order (newest-first)
//! 3. Keep an entry when its identifier is neither persisted nor already kept
//!
//! The incoming batch is only ever compared against the existing set, never
//! against its own tail, so a repeated identifier can't mask new entries.

use pchist_common::ListenRecord;
use std::collections::HashSet;

/// Records from `incoming` whose identifier is absent from `existing`
///
/// Preserves the relative order of `incoming`. An identifier that repeats
/// within `incoming` is emitted once, at its first (newest) position, so the
/// result never holds two records for one episode. Runs in O(|I| + |E|).
pub fn reconcile(incoming: &[ListenRecord], existing: &[ListenRecord]) -> Vec<ListenRecord> {
    if incoming.is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<&str> = existing.iter().map(|r| r.episode_uuid.as_str()).collect();

    incoming
        .iter()
        .filter(|record| seen.insert(record.episode_uuid.as_str()))
        .cloned()
        .collect()
}

/// How much history the store keeps after a sync
///
/// Limits which incoming entries are reconciled, then prunes after the
/// append. Never decides on its own what is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep everything
    #[default]
    Unbounded,
    /// Keep only the N most recently saved records
    Capped(usize),
}

impl RetentionPolicy {
    pub fn from_max_records(max_records: Option<usize>) -> Self {
        match max_records {
            Some(max) => RetentionPolicy::Capped(max),
            None => RetentionPolicy::Unbounded,
        }
    }

    /// Prefix of a newest-first batch that can survive this policy
    ///
    /// Under `Capped(n)` only the `n` newest distinct episodes can remain
    /// stored after a sync. Anything older would be pruned right away, or
    /// was pruned by an earlier run and must not come back as new.
    pub fn retained<'a>(&self, incoming: &'a [ListenRecord]) -> &'a [ListenRecord] {
        match self {
            RetentionPolicy::Unbounded => incoming,
            RetentionPolicy::Capped(max) => {
                let mut seen: HashSet<&str> = HashSet::new();
                let end = incoming
                    .iter()
                    .position(|record| {
                        seen.insert(record.episode_uuid.as_str());
                        seen.len() > *max
                    })
                    .unwrap_or(incoming.len());
                &incoming[..end]
            }
        }
    }
}

//! Sync pipeline
//!
//! Fetch the incoming history from a [`HistorySource`], merge it into the
//! [`HistoryStore`], then apply the retention policy.
//!
//! Transport and payload failures end up as an empty incoming batch (the
//! source has already logged them), which makes the run a no-op. A store that
//! cannot be reached is an error: counting a batch as "new" without saving it
//! would misreport the run.

use crate::config::Credentials;
use crate::db::history::HistoryStore;
use crate::services::pocketcasts_client::{parse_history_payload, PocketCastsClient};
use crate::services::reconciler::RetentionPolicy;
use pchist_common::{ListenRecord, Result};
use std::path::PathBuf;
use tracing::Span;

/// Where the incoming history comes from
pub enum HistorySource {
    /// Log in and call `/user/history`
    Api {
        client: PocketCastsClient,
        credentials: Credentials,
    },
    /// A saved `/user/history` response body
    SampleFile(PathBuf),
}

impl HistorySource {
    /// Incoming history, newest first
    ///
    /// Login, transport and parse failures are logged and yield an empty
    /// history. Only a sample file that cannot be read is an error.
    pub async fn fetch(&self) -> Result<Vec<ListenRecord>> {
        match self {
            HistorySource::Api {
                client,
                credentials,
            } => match client.login(credentials).await {
                Ok(token) => Ok(client.get_history(&token).await),
                Err(e) => {
                    tracing::error!("Login to Pocket Casts failed: {}", e);
                    Ok(Vec::new())
                }
            },
            HistorySource::SampleFile(path) => {
                tracing::debug!("Loading sample data from {}", path.display());
                let body = tokio::fs::read(path).await?;
                match parse_history_payload(&body) {
                    Ok(records) => Ok(records),
                    Err(e) => {
                        tracing::error!(
                            "Failed to decode JSON response from sample file {}: {}",
                            path.display(),
                            e
                        );
                        Ok(Vec::new())
                    }
                }
            }
        }
    }
}

/// Outcome of one sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries received from the source
    pub fetched: usize,
    /// Entries that were new and got saved
    pub new: usize,
    /// Rows evicted by the retention policy
    pub pruned: u64,
    /// Rows in the store after the run (unknown when nothing was fetched)
    pub total: Option<u64>,
}

/// Runs the fetch → merge → prune pipeline against one store
pub struct HistorySync {
    store: HistoryStore,
    retention: RetentionPolicy,
    span: Span,
}

impl HistorySync {
    pub fn new(store: HistoryStore, retention: RetentionPolicy, span: Span) -> Self {
        Self {
            store,
            retention,
            span,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Fetch from `source` and merge
    pub async fn sync(&self, source: &HistorySource) -> Result<SyncReport> {
        let incoming = source.fetch().await?;
        self.run(&incoming).await
    }

    /// Merge an incoming newest-first batch into the store
    ///
    /// An empty batch returns immediately without touching the store.
    #[tracing::instrument(parent = &self.span, skip_all, fields(incoming = incoming.len()))]
    pub async fn run(&self, incoming: &[ListenRecord]) -> Result<SyncReport> {
        if incoming.is_empty() {
            tracing::info!("No listening history received; nothing to reconcile");
            return Ok(SyncReport::default());
        }

        self.store.check_available().await?;

        // Entries the cap would evict never count as new
        let window = self.retention.retained(incoming);
        let new_records = self.store.merge(window).await?;

        let pruned = match self.retention {
            RetentionPolicy::Unbounded => 0,
            RetentionPolicy::Capped(max_records) => self.store.prune_to(max_records).await?,
        };

        let total = self.store.count().await?;

        let report = SyncReport {
            fetched: incoming.len(),
            new: new_records.len(),
            pruned,
            total: Some(total),
        };

        tracing::info!(
            fetched = report.fetched,
            new = report.new,
            pruned = report.pruned,
            total,
            "{} records added.",
            report.new
        );

        Ok(report)
    }
}

/// One-shot pipeline run with the caller's current span
pub async fn sync_history(
    source: &HistorySource,
    store: &HistoryStore,
    retention: RetentionPolicy,
) -> Result<SyncReport> {
    HistorySync::new(store.clone(), retention, Span::current())
        .sync(source)
        .await
}

//! Services for pchist-sync

pub mod history_sync;
pub mod pocketcasts_client;
pub mod reconciler;

pub use history_sync::{sync_history, HistorySource, HistorySync, SyncReport};
pub use pocketcasts_client::{
    AuthToken, ClientSettings, EpisodeUpdate, PocketCastsClient, PocketCastsError, PodcastSummary,
};
pub use reconciler::{reconcile, RetentionPolicy};

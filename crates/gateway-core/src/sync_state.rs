//! Singleton sync state (§3 "Sync State (singleton)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_graph_sync: Option<DateTime<Utc>>,
    pub last_d1_sync: Option<DateTime<Utc>>,
    pub last_reconciliation: Option<DateTime<Utc>>,
    pub last_graph_feedback_sync: Option<DateTime<Utc>>,
    pub last_feedback_created_at: Option<DateTime<Utc>>,
    pub agents_synced: u64,
    pub embeddings_generated: u64,
    pub feedback_synced: u64,
    pub agents_deleted: u64,
    pub last_error: Option<String>,
}

impl SyncState {
    /// Advance `last_d1_sync` only if at least one row was processed, and
    /// only to the maximum timestamp seen among processed rows (§4.11,
    /// property P5). Calling this with an empty slice is a no-op.
    pub fn advance_d1_sync(&mut self, processed_timestamps: &[DateTime<Utc>]) {
        if let Some(max) = processed_timestamps.iter().max() {
            self.last_d1_sync = Some(*max);
        }
    }
}

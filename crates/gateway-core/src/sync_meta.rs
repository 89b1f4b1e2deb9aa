//! Per-agent sync metadata (§3 "Sync Metadata").

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `sync_status` enum on the sync metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Error,
}

/// Tracks what has already been embedded/upserted for one agent so that
/// graph sync can diff by hash instead of by timestamp (I2, I3, I4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub agent_id: AgentId,
    pub embed_hash: String,
    pub content_hash: String,
    pub qdrant_synced_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub needs_reembed: bool,
    pub last_error: Option<String>,
    pub d1_classification_at: Option<DateTime<Utc>>,
    pub d1_reputation_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SyncMetadata {
    pub fn new(agent_id: AgentId, embed_hash: String, content_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            embed_hash,
            content_hash,
            qdrant_synced_at: Some(now),
            sync_status: SyncStatus::Synced,
            needs_reembed: false,
            last_error: None,
            d1_classification_at: None,
            d1_reputation_at: None,
            updated_at: now,
        }
    }

    /// Classification the record needs in the next graph sync, either
    /// because the vector has never been generated, because upstream hashes
    /// disagree, or because `needs_reembed` was raised out of band (I4).
    pub fn diff(&self, new_embed_hash: &str, new_content_hash: &str) -> DiffBucket {
        if self.needs_reembed || self.embed_hash != new_embed_hash {
            DiffBucket::EmbedAndPayloadChanged
        } else if self.content_hash != new_content_hash {
            DiffBucket::PayloadOnlyChanged
        } else {
            DiffBucket::Unchanged
        }
    }

    pub fn mark_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.sync_status = SyncStatus::Error;
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    pub fn mark_synced(&mut self, embed_hash: String, content_hash: String, now: DateTime<Utc>) {
        self.embed_hash = embed_hash;
        self.content_hash = content_hash;
        self.sync_status = SyncStatus::Synced;
        self.needs_reembed = false;
        self.last_error = None;
        self.qdrant_synced_at = Some(now);
        self.updated_at = now;
    }
}

/// Result of classifying an agent into one of the three graph-sync buckets
/// (§4.10 step 3). A record with no metadata row at all is always
/// `EmbedAndPayloadChanged` (the "missing" bucket) — callers distinguish
/// genuinely-missing from changed via `SyncMetadata::diff` only existing
/// for rows that have metadata; a missing row is handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffBucket {
    /// No metadata row exists: full path (embed + upsert).
    Missing,
    /// `embed_hash` differs, or `needs_reembed` was set: regenerate vector.
    EmbedAndPayloadChanged,
    /// Only `content_hash` differs: payload-only upsert, vector untouched.
    PayloadOnlyChanged,
    /// Neither hash differs: skip.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;

    fn meta(embed: &str, content: &str) -> SyncMetadata {
        SyncMetadata::new(AgentId::new(1, "1").unwrap(), embed.into(), content.into(), Utc::now())
    }

    #[test]
    fn diff_unchanged_when_both_hashes_match() {
        let m = meta("e1", "c1");
        assert_eq!(m.diff("e1", "c1"), DiffBucket::Unchanged);
    }

    #[test]
    fn diff_embed_changed_takes_priority() {
        let m = meta("e1", "c1");
        assert_eq!(m.diff("e2", "c2"), DiffBucket::EmbedAndPayloadChanged);
        assert_eq!(m.diff("e2", "c1"), DiffBucket::EmbedAndPayloadChanged);
    }

    #[test]
    fn diff_payload_only_when_embed_matches_but_content_differs() {
        let m = meta("e1", "c1");
        assert_eq!(m.diff("e1", "c2"), DiffBucket::PayloadOnlyChanged);
    }

    #[test]
    fn needs_reembed_forces_embed_path_even_with_matching_hashes() {
        let mut m = meta("e1", "c1");
        m.needs_reembed = true;
        assert_eq!(m.diff("e1", "c1"), DiffBucket::EmbedAndPayloadChanged);
    }
}

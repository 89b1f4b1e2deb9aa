//! Reachability derivation from recent feedback tags (§4.8, scenario 6).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The tag that marks a feedback entry as an MCP reachability probe.
pub const TAG_REACHABILITY_MCP: &str = "reachability_mcp";
/// The tag that marks a feedback entry as an A2A reachability probe.
pub const TAG_REACHABILITY_A2A: &str = "reachability_a2a";

/// Minimum score for a reachability probe to count as "reachable".
pub const REACHABLE_SCORE_THRESHOLD: u8 = 70;

/// Window considered "recent" for reachability derivation.
pub const REACHABILITY_WINDOW: Duration = Duration::hours(24);

/// The subset of a feedback event that reachability derivation needs.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    pub tags: Vec<String>,
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

/// Derived reachable-yes/no per protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reachability {
    pub mcp: bool,
    pub a2a: bool,
}

/// Derive reachability for one agent from its feedback, restricted to the
/// last 24h. For each tag, take the most recent matching feedback;
/// reachable iff score >= 70.
pub fn derive(probes: &[ReachabilityProbe], now: DateTime<Utc>) -> Reachability {
    let cutoff = now - REACHABILITY_WINDOW;
    let recent = probes.iter().filter(|p| p.created_at >= cutoff);

    let latest_for = |tag: &str| -> Option<&ReachabilityProbe> {
        recent
            .clone()
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .max_by_key(|p| p.created_at)
    };

    Reachability {
        mcp: latest_for(TAG_REACHABILITY_MCP)
            .map(|p| p.score >= REACHABLE_SCORE_THRESHOLD)
            .unwrap_or(false),
        a2a: latest_for(TAG_REACHABILITY_A2A)
            .map(|p| p.score >= REACHABLE_SCORE_THRESHOLD)
            .unwrap_or(false),
    }
}

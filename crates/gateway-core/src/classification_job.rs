//! Classification job queue rows (§3, §4.9).

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationJob {
    pub agent_id: AgentId,
    pub force: bool,
    pub attempts: u32,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

impl ClassificationJob {
    pub fn new(agent_id: AgentId, force: bool) -> Self {
        Self {
            agent_id,
            force,
            attempts: 0,
            status: JobStatus::Pending,
            last_error: None,
        }
    }

    /// Transition into `processing` and increment the attempt counter, as
    /// happens on message receipt (§4.9).
    pub fn start_attempt(&mut self) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.last_error = None;
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.last_error = None;
    }

    /// Record a failure. Returns `true` if the job should be retried
    /// (attempts remain under `max_attempts`), `false` if it should move to
    /// the dead-letter queue.
    pub fn fail(&mut self, error: impl Into<String>, max_attempts: u32) -> bool {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        self.attempts < max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ClassificationJob {
        ClassificationJob::new(AgentId::new(1, "1").unwrap(), false)
    }

    #[test]
    fn start_attempt_increments_and_transitions() {
        let mut j = job();
        j.start_attempt();
        assert_eq!(j.status, JobStatus::Processing);
        assert_eq!(j.attempts, 1);
    }

    #[test]
    fn fail_signals_retry_until_max_attempts() {
        let mut j = job();
        j.start_attempt();
        assert!(j.fail("boom", 3));
        j.start_attempt();
        j.start_attempt();
        assert!(!j.fail("boom again", 3));
    }
}

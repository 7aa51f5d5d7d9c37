//! Policies deciding when a finished job leaves the registry.

use chrono::TimeDelta;
use reelfetch_core::types::Timestamp;

use crate::job::JobSnapshot;

/// Decides whether a job may be dropped from the registry.
///
/// Implementations must never evict a job that has not reached a terminal
/// state; its runner still writes to it.
pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, job: &JobSnapshot, now: Timestamp) -> bool;
}

/// Evict jobs a fixed time after they finished.
#[derive(Debug, Clone, Copy)]
pub struct TtlEviction {
    ttl: TimeDelta,
}

impl TtlEviction {
    pub fn new(ttl: TimeDelta) -> Self {
        Self { ttl }
    }
}

impl EvictionPolicy for TtlEviction {
    fn should_evict(&self, job: &JobSnapshot, now: Timestamp) -> bool {
        if !job.state.is_terminal() {
            return false;
        }
        job.finished_at
            .and_then(|finished| finished.checked_add_signed(self.ttl))
            .is_some_and(|deadline| deadline <= now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use reelfetch_core::job::JobState;
    use reelfetch_core::types::JobId;

    use super::*;

    fn snapshot(state: JobState, finished_secs_ago: Option<i64>) -> JobSnapshot {
        let now = Utc::now();
        JobSnapshot {
            id: JobId::generate(),
            state,
            result_file: None,
            error_message: None,
            created_at: now - TimeDelta::hours(2),
            finished_at: finished_secs_ago.map(|s| now - TimeDelta::seconds(s)),
        }
    }

    #[test]
    fn running_jobs_are_never_evicted() {
        let policy = TtlEviction::new(TimeDelta::zero());
        assert!(!policy.should_evict(&snapshot(JobState::Running, None), Utc::now()));
        assert!(!policy.should_evict(&snapshot(JobState::Pending, None), Utc::now()));
    }

    #[test]
    fn finished_jobs_are_evicted_after_ttl() {
        let policy = TtlEviction::new(TimeDelta::seconds(60));
        assert!(!policy.should_evict(&snapshot(JobState::Done, Some(30)), Utc::now()));
        assert!(policy.should_evict(&snapshot(JobState::Done, Some(120)), Utc::now()));
        assert!(policy.should_evict(&snapshot(JobState::Failed, Some(61)), Utc::now()));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let policy = TtlEviction::new(TimeDelta::MAX);
        assert!(!policy.should_evict(&snapshot(JobState::Done, Some(1_000_000)), Utc::now()));
    }
}

//! Lookup of live jobs by id.
//!
//! One lock guards map membership. It is never held across an `.await` or
//! any I/O; per-job state has its own lock inside [`JobHandle`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reelfetch_core::error::CoreError;
use reelfetch_core::types::{JobId, Timestamp};

use crate::eviction::EvictionPolicy;
use crate::job::{JobHandle, JobWriter};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job under a fresh id.
    pub fn create(&self) -> (Arc<JobHandle>, JobWriter) {
        let mut jobs = self.jobs();
        let id = loop {
            let candidate = JobId::generate();
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        let (handle, writer) = JobHandle::create(id.clone());
        jobs.insert(id, Arc::clone(&handle));
        (handle, writer)
    }

    pub fn get(&self, id: &JobId) -> Result<Arc<JobHandle>, CoreError> {
        self.jobs()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Remove every job the policy selects. Returns how many were removed.
    pub fn evict(&self, policy: &dyn EvictionPolicy, now: Timestamp) -> usize {
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|_, job| !policy.should_evict(&job.snapshot(), now));
        before - jobs.len()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobHandle>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

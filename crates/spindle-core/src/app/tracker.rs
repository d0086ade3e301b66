//! StatusTracker - provider のステータスを消費する側
//!
//! `JobState` 自体は遷移を強制しないので、「終端状態は抜けない」という
//! 不変条件はここで守ります。終端のあとに別の状態が報告されたら、
//! 最初の終端スナップショットを保持して警告を出します。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{JobState, JobStatus, ProviderError};
use crate::ports::{Clock, ExecutionProvider, ProviderJobId, SystemClock};

/// What happened to a tracked job on one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// First status seen for this job.
    Initial(JobState),
    Changed { from: JobState, to: JobState },
    Unchanged(JobState),

    /// The provider reported a new state after a terminal one; it was dropped.
    IgnoredAfterTerminal { terminal: JobState, reported: JobState },
}

#[derive(Debug, Clone)]
pub struct TrackedJob {
    pub status: Option<JobStatus>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl TrackedJob {
    pub fn state(&self) -> JobState {
        self.status
            .as_ref()
            .map_or(JobState::Unknown, JobStatus::state)
    }

    pub fn terminal(&self) -> bool {
        self.state().terminal()
    }
}

/// Latest snapshot per job for one provider.
pub struct StatusTracker<C = SystemClock> {
    jobs: BTreeMap<ProviderJobId, TrackedJob>,
    clock: C,
}

impl StatusTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for StatusTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> StatusTracker<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            jobs: BTreeMap::new(),
            clock,
        }
    }

    /// Start tracking a submitted job. Re-tracking keeps the existing snapshot.
    pub fn track(&mut self, job_id: ProviderJobId) {
        self.jobs.entry(job_id).or_insert(TrackedJob {
            status: None,
            observed_at: None,
        });
    }

    pub fn get(&self, job_id: &ProviderJobId) -> Option<&TrackedJob> {
        self.jobs.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids that still need polling.
    pub fn active(&self) -> Vec<ProviderJobId> {
        self.jobs
            .iter()
            .filter(|(_, job)| !job.terminal())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn all_terminal(&self) -> bool {
        self.jobs.values().all(TrackedJob::terminal)
    }

    /// Record one snapshot for `job_id` (tracking it if it wasn't yet).
    pub fn observe(&mut self, job_id: &ProviderJobId, status: JobStatus) -> Transition {
        let now = self.clock.now();
        let job = self.jobs.entry(job_id.clone()).or_insert(TrackedJob {
            status: None,
            observed_at: None,
        });

        let transition = match &job.status {
            None => Transition::Initial(status.state()),
            Some(prev) if prev.terminal() && prev.state() != status.state() => {
                tracing::warn!(
                    job_id = %job_id,
                    terminal = %prev.state(),
                    reported = %status.state(),
                    "provider reported a state after a terminal one, ignoring"
                );
                return Transition::IgnoredAfterTerminal {
                    terminal: prev.state(),
                    reported: status.state(),
                };
            }
            Some(prev) if prev.state() == status.state() => Transition::Unchanged(status.state()),
            Some(prev) => Transition::Changed {
                from: prev.state(),
                to: status.state(),
            },
        };

        if let Transition::Changed { from, to } = &transition {
            tracing::debug!(job_id = %job_id, %from, %to, "job state changed");
        }
        job.status = Some(status);
        job.observed_at = Some(now);
        transition
    }

    /// Poll `provider` once for every active job.
    ///
    /// Provider errors propagate unchanged; nothing is recorded for that round.
    pub async fn poll(
        &mut self,
        provider: &dyn ExecutionProvider,
    ) -> Result<Vec<(ProviderJobId, Transition)>, ProviderError> {
        let ids = self.active();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let statuses = provider.status(&ids).await?;
        if statuses.len() != ids.len() {
            return Err(ProviderError::permanent(format!(
                "provider '{}' returned {} statuses for {} job ids",
                provider.label(),
                statuses.len(),
                ids.len()
            )));
        }

        Ok(ids
            .into_iter()
            .zip(statuses)
            .map(|(id, status)| {
                let transition = self.observe(&id, status);
                (id, transition)
            })
            .collect())
    }

    /// Poll on the provider's interval until every tracked job is terminal.
    ///
    /// No timeout: callers wanting one wrap this in `tokio::time::timeout`.
    pub async fn poll_until_terminal(
        &mut self,
        provider: &dyn ExecutionProvider,
    ) -> Result<(), ProviderError> {
        loop {
            self.poll(provider).await?;
            if self.all_terminal() {
                return Ok(());
            }
            tokio::time::sleep(provider.status_polling_interval()).await;
        }
    }
}

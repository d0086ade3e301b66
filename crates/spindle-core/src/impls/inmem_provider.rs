//! InMemoryProvider - 開発・テスト用の ExecutionProvider
//!
//! 実際のバックエンドには何も投げません。投入されたジョブは `status` が
//! 呼ばれるたびに PENDING → RUNNING → COMPLETED と進みます。
//!
//! # 失敗の境界
//! - 同時に抱えているジョブが `scaling.max_blocks` に達している: Transient
//!   （ソフトな失敗。あとで再投入してよい）
//! - 通信路を宣言しているのに未注入 / `tasks_per_node == 0`: Permanent
//! - ログファイルの書き出し失敗: Infrastructure

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::channels::ensure_transport_ready;
use crate::domain::{JobState, JobStatus, ProviderError};
use crate::ports::{
    ChannelSlot, ExecutionProvider, ProviderConfig, ProviderJobId, ResourceHints, ScalingConfig,
};

/// Scripted behaviour for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobScript {
    /// Completes after `polls_pending` + `polls_running` status calls.
    Succeed,

    /// Fails with the given exit code instead of completing.
    Fail { exit_code: i32 },
}

#[derive(Debug)]
struct SimJob {
    job_name: String,
    command: String,
    tasks_per_node: u32,
    script: JobScript,
    polls: u32,
    cancel_requested: bool,
    state: JobState,
}

impl SimJob {
    fn is_active(&self) -> bool {
        !self.state.terminal()
    }
}

pub struct InMemoryProvider {
    config: ProviderConfig,
    channel_slot: Option<ChannelSlot>,
    polls_pending: u32,
    polls_running: u32,
    next_script: Mutex<Option<JobScript>>,
    jobs: Mutex<HashMap<ProviderJobId, SimJob>>,
    next_id: AtomicU64,
}

impl InMemoryProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            channel_slot: None,
            polls_pending: 1,
            polls_running: 1,
            next_script: Mutex::new(None),
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Declare a managed-channel capability (single or multi).
    pub fn with_channel_slot(mut self, slot: ChannelSlot) -> Self {
        self.channel_slot = Some(slot);
        self
    }

    /// How many status calls a job spends in PENDING and then RUNNING.
    pub fn with_progress(mut self, polls_pending: u32, polls_running: u32) -> Self {
        self.polls_pending = polls_pending;
        self.polls_running = polls_running;
        self
    }

    /// Script the outcome of the next submitted job.
    pub async fn script_next(&self, script: JobScript) {
        *self.next_script.lock().await = Some(script);
    }

    fn log_path(&self, job_id: &ProviderJobId, stream: &str) -> Option<PathBuf> {
        self.config
            .script_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{job_id}.{stream}", self.config.label)))
    }

    /// Write the job's stdout like a real launcher would: the command, one line
    /// per replica, plus the resource variables exported to it.
    fn write_stdout(
        &self,
        job_id: &ProviderJobId,
        job: &SimJob,
    ) -> Result<Option<PathBuf>, ProviderError> {
        let Some(path) = self.log_path(job_id, "stdout") else {
            return Ok(None);
        };
        let mut out = String::new();
        for (name, value) in self.config.resources.env_vars() {
            out.push_str(&format!("{name}={value}\n"));
        }
        for replica in 0..job.tasks_per_node {
            out.push_str(&format!("[{}#{replica}] {}\n", job.job_name, job.command));
        }
        std::fs::write(&path, out).map_err(|e| {
            ProviderError::infrastructure(format!("failed to write {}", path.display()))
                .with_source(e)
        })?;
        Ok(Some(path))
    }

    fn advance(
        &self,
        job_id: &ProviderJobId,
        job: &mut SimJob,
    ) -> Result<JobStatus, ProviderError> {
        if job.is_active() {
            job.polls += 1;
            job.state = if job.cancel_requested {
                JobState::Cancelled
            } else if job.polls <= self.polls_pending {
                JobState::Pending
            } else if job.polls <= self.polls_pending + self.polls_running {
                JobState::Running
            } else {
                match job.script {
                    JobScript::Succeed => JobState::Completed,
                    JobScript::Fail { .. } => JobState::Failed,
                }
            };
        }

        let mut status = JobStatus::new(job.state);
        match (job.state, &job.script) {
            (JobState::Completed, _) => {
                status = status.with_exit_code(0);
            }
            (JobState::Failed, JobScript::Fail { exit_code }) => {
                status = status
                    .with_exit_code(*exit_code)
                    .with_message(format!("exited with code {exit_code}"));
            }
            (JobState::Cancelled, _) => {
                status = status.with_message("cancelled by request");
            }
            _ => {}
        }
        if job.state.terminal() && job.state != JobState::Cancelled {
            if let Some(path) = self.write_stdout(job_id, job)? {
                status = status.with_stdout_path(path);
            }
            // 出力の無い stderr はファイル自体を作らない
            if let Some(path) = self.log_path(job_id, "stderr") {
                status = status.with_stderr_path(path);
            }
        }
        Ok(status)
    }
}

#[async_trait]
impl ExecutionProvider for InMemoryProvider {
    async fn submit(
        &self,
        command: &str,
        tasks_per_node: u32,
        job_name: &str,
    ) -> Result<ProviderJobId, ProviderError> {
        ensure_transport_ready(self)?;
        if tasks_per_node == 0 {
            return Err(ProviderError::permanent("tasks_per_node must be at least 1"));
        }

        let mut jobs = self.jobs.lock().await;
        let active = jobs.values().filter(|job| job.is_active()).count();
        if active >= self.config.scaling.max_blocks as usize {
            return Err(ProviderError::transient(format!(
                "provider '{}' is at max_blocks={}",
                self.config.label, self.config.scaling.max_blocks
            )));
        }

        let script = self.next_script.lock().await.take().unwrap_or(JobScript::Succeed);
        let job_id = ProviderJobId::new(format!(
            "{}-{}",
            self.config.label,
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        jobs.insert(
            job_id.clone(),
            SimJob {
                job_name: job_name.to_string(),
                command: command.to_string(),
                tasks_per_node,
                script,
                polls: 0,
                cancel_requested: false,
                state: JobState::Pending,
            },
        );
        tracing::info!(provider = %self.config.label, %job_id, job_name, "job submitted");
        Ok(job_id)
    }

    async fn status(&self, job_ids: &[ProviderJobId]) -> Result<Vec<JobStatus>, ProviderError> {
        let mut jobs = self.jobs.lock().await;
        job_ids
            .iter()
            .map(|job_id| match jobs.get_mut(job_id) {
                Some(job) => self.advance(job_id, job),
                None => Ok(JobStatus::new(JobState::Unknown)
                    .with_message(format!("no such job: {job_id}"))),
            })
            .collect()
    }

    async fn cancel(&self, job_ids: &[ProviderJobId]) -> Result<Vec<bool>, ProviderError> {
        let mut jobs = self.jobs.lock().await;
        Ok(job_ids
            .iter()
            .map(|job_id| match jobs.get_mut(job_id) {
                Some(job) if job.is_active() => {
                    job.cancel_requested = true;
                    true
                }
                _ => false,
            })
            .collect())
    }

    fn label(&self) -> &str {
        &self.config.label
    }

    fn status_polling_interval(&self) -> Duration {
        self.config.status_polling_interval()
    }

    fn scaling(&self) -> &ScalingConfig {
        &self.config.scaling
    }

    fn resource_hints(&self) -> &ResourceHints {
        &self.config.resources
    }

    fn resource_hints_mut(&mut self) -> &mut ResourceHints {
        &mut self.config.resources
    }

    fn channels(&self) -> Option<&ChannelSlot> {
        self.channel_slot.as_ref()
    }

    fn channels_mut(&mut self) -> Option<&mut ChannelSlot> {
        self.channel_slot.as_mut()
    }
}

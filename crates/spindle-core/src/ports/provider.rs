//! ExecutionProvider port - ジョブスケジューラ（バッチキュー、クラスタ、クラウド API）の抽象化
//!
//! ```text
//!                     +------------------
//!  command    ------->|  submit
//!  job id    <--------|---+
//!                     |
//!  [ ids ]    ------->|  status
//!  [statuses]<--------|---+
//!                     |
//!  [ ids ]    ------->|  cancel
//!  [accepted]<--------|---+
//!                     +------------------
//! ```
//!
//! # 失敗の扱い
//! `submit` は「空の id」を返して失敗を表すことはしません。
//! - 一時的に投入できない: `ProviderError` (`ErrorKind::Transient`)
//! - バックエンドの障害など: `ErrorKind::Permanent` / `ErrorKind::Infrastructure`
//!
//! どこまでを Transient とするかは各 provider の実装でドキュメントすること。

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{JobStatus, ProviderError};
use crate::ports::channel::ChannelSlot;

/// Default `job_name` for callers that don't care.
pub const DEFAULT_JOB_NAME: &str = "spindle.auto";

/// Environment variable a provider sets to the per-node core count.
pub const CORES_ENV_VAR: &str = "SPINDLE_CORES";

/// Environment variable a provider sets to the per-node memory, in GB.
pub const MEMORY_GB_ENV_VAR: &str = "SPINDLE_MEMORY_GB";

/// Opaque job identifier returned by a provider's `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderJobId(String);

impl ProviderJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Block scaling parameters (a block is one provisioning request of one or more nodes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub min_blocks: u32,
    pub max_blocks: u32,
    pub init_blocks: u32,
    pub nodes_per_block: u32,

    /// Ratio of provisioned capacity to outstanding tasks (0.0..=1.0).
    pub parallelism: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_blocks: 0,
            max_blocks: 1,
            init_blocks: 1,
            nodes_per_block: 1,
            parallelism: 1.0,
        }
    }
}

/// Optional per-node capacity hints. `None` means unknown, not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceHints {
    pub cores_per_node: Option<u32>,

    /// Memory per node in GB.
    pub mem_per_node: Option<f64>,
}

impl ResourceHints {
    /// Variables a provider should export to commands it launches.
    ///
    /// Only hints that are set produce a variable.
    pub fn env_vars(&self) -> BTreeMap<&'static str, String> {
        let mut vars = BTreeMap::new();
        if let Some(cores) = self.cores_per_node {
            vars.insert(CORES_ENV_VAR, cores.to_string());
        }
        if let Some(mem) = self.mem_per_node {
            vars.insert(MEMORY_GB_ENV_VAR, mem.to_string());
        }
        vars
    }
}

/// Provider configuration as loaded from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub label: String,
    pub status_polling_interval_ms: u64,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub resources: ResourceHints,

    /// Where the provider writes submit scripts, if it uses any.
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Backend-specific settings the core does not interpret.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProviderConfig {
    pub fn new(label: impl Into<String>, status_polling_interval: Duration) -> Self {
        Self {
            label: label.into(),
            status_polling_interval_ms: u64::try_from(status_polling_interval.as_millis())
                .unwrap_or(u64::MAX),
            scaling: ScalingConfig::default(),
            resources: ResourceHints::default(),
            script_dir: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn status_polling_interval(&self) -> Duration {
        Duration::from_millis(self.status_polling_interval_ms)
    }
}

/// ExecutionProvider は計算資源の要求・監視・キャンセルを行う
///
/// `submit` / `status` / `cancel` はネットワーク越しの待ちを含みうるので async。
/// リトライやバックオフはここでは行わず、エラーはそのまま呼び出し元
/// （poller）へ返します。
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Request resources that run `command` `tasks_per_node` times per node.
    async fn submit(
        &self,
        command: &str,
        tasks_per_node: u32,
        job_name: &str,
    ) -> Result<ProviderJobId, ProviderError>;

    /// One status per id, in the same order.
    async fn status(&self, job_ids: &[ProviderJobId]) -> Result<Vec<JobStatus>, ProviderError>;

    /// Best-effort cancel. `true` means the request was accepted; re-poll
    /// `status` to confirm the job actually stopped.
    async fn cancel(&self, job_ids: &[ProviderJobId]) -> Result<Vec<bool>, ProviderError>;

    fn label(&self) -> &str;

    /// How long the poller should wait between `status` calls.
    fn status_polling_interval(&self) -> Duration;

    fn scaling(&self) -> &ScalingConfig;

    fn resource_hints(&self) -> &ResourceHints;

    fn resource_hints_mut(&mut self) -> &mut ResourceHints;

    fn cores_per_node(&self) -> Option<u32> {
        self.resource_hints().cores_per_node
    }

    fn set_cores_per_node(&mut self, cores: Option<u32>) {
        self.resource_hints_mut().cores_per_node = cores;
    }

    fn mem_per_node(&self) -> Option<f64> {
        self.resource_hints().mem_per_node
    }

    fn set_mem_per_node(&mut self, mem_gb: Option<f64>) {
        self.resource_hints_mut().mem_per_node = mem_gb;
    }

    /// Managed-channel capability. `None` means the provider handles
    /// its own connectivity.
    fn channels(&self) -> Option<&ChannelSlot> {
        None
    }

    fn channels_mut(&mut self) -> Option<&mut ChannelSlot> {
        None
    }
}

//! Channel port - provider がバックエンドと話すための通信路
//!
//! 通信路の実装（ssh, local など）はこのクレートの外にあります。
//! Provider は「通信路を 1 本 / 複数本管理してほしい」という能力を
//! `ChannelSlot` で宣言し、オーケストレーション層が submit 前に注入します。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ProviderError;

/// Result of running a command over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Channel は provider が管理を委ねる通信路
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable endpoint name (host, socket, ...).
    fn name(&self) -> &str;

    /// Run a command on the far side and wait for it to finish.
    async fn execute_wait(
        &self,
        command: &str,
        walltime: Duration,
    ) -> Result<CommandOutput, ProviderError>;
}

/// Capability declared by a provider that wants managed channels.
///
/// A provider with no slot manages its own connectivity.
pub enum ChannelSlot {
    /// Needs exactly one channel; `None` until injected.
    Single(Option<Arc<dyn Channel>>),

    /// Needs a list of channels; empty until injected.
    Multi(Vec<Arc<dyn Channel>>),
}

impl ChannelSlot {
    pub fn single() -> Self {
        ChannelSlot::Single(None)
    }

    pub fn multi() -> Self {
        ChannelSlot::Multi(Vec::new())
    }

    /// Has transport been injected yet?
    pub fn is_ready(&self) -> bool {
        match self {
            ChannelSlot::Single(channel) => channel.is_some(),
            ChannelSlot::Multi(channels) => !channels.is_empty(),
        }
    }

    pub fn channels(&self) -> Vec<Arc<dyn Channel>> {
        match self {
            ChannelSlot::Single(channel) => channel.iter().cloned().collect(),
            ChannelSlot::Multi(channels) => channels.clone(),
        }
    }
}

impl fmt::Debug for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.channels().iter().map(|c| c.name().to_string()).collect();
        match self {
            ChannelSlot::Single(_) => f.debug_tuple("Single").field(&names).finish(),
            ChannelSlot::Multi(_) => f.debug_tuple("Multi").field(&names).finish(),
        }
    }
}

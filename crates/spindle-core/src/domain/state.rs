//! State - ジョブのライフサイクル状態
//!
//! Provider が報告する状態を分類するだけで、遷移のロジックは持ちません。
//! 「終端状態から抜けない」ことを保証したい場合は、スナップショットを消費する
//! 側（`app::tracker::StatusTracker`）の責務です。

use serde::{Deserialize, Serialize};
use std::fmt;

/// JobState はバックエンドのジョブ状態を表現
///
/// # 終端状態
/// - CANCELLED, COMPLETED, FAILED, TIMEOUT
///
/// それ以外（UNKNOWN, PENDING, RUNNING, HELD）は非終端です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Unknown,
    Pending,
    Running,
    Cancelled,
    Completed,
    Failed,
    Timeout,
    Held,
}

impl JobState {
    pub const ALL: [JobState; 8] = [
        JobState::Unknown,
        JobState::Pending,
        JobState::Running,
        JobState::Cancelled,
        JobState::Completed,
        JobState::Failed,
        JobState::Timeout,
        JobState::Held,
    ];

    /// Is this a terminal state (no further transitions expected)?
    pub fn terminal(self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Completed | JobState::Failed | JobState::Timeout
        )
    }

    /// Canonical display name.
    pub fn status_name(self) -> &'static str {
        match self {
            JobState::Unknown => "UNKNOWN",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Cancelled => "CANCELLED",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::Held => "HELD",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_name())
    }
}

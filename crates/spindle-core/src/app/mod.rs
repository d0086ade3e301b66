//! App - ports を組み合わせたアプリケーション層
//!
//! # 主要コンポーネント
//! - **StatusTracker**: provider をポーリングし、終端状態を保持する
//! - **capacity**: 資源ヒントから 1 ノードあたりのタスク数を見積もる
//! - **channels**: submit 前の通信路注入

pub mod capacity;
pub mod channels;
pub mod tracker;

// 主要な型を再エクスポート
pub use self::capacity::{TaskFootprint, tasks_per_node};
pub use self::channels::{ensure_transport_ready, inject_channels};
pub use self::tracker::{StatusTracker, TrackedJob, Transition};

//! spindle-core
//!
//! Memoization and execution-provider core for a distributed task engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, value, task, state, job, errors）
//! - **memo**: identity エンコーダと Memoizer
//! - **ports**: 抽象化レイヤー（ExecutionProvider, Channel, Digest, Clock, IdGenerator）
//! - **app**: ports を組み合わせたロジック（StatusTracker, capacity, channels）
//! - **impls**: 実装（InMemoryProvider など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod memo;
pub mod ports;

pub use domain::{JobState, JobStatus, MemoError, MemoValue, ProviderError, TaskDescriptor, TaskId};
pub use memo::{Checkpoint, IdentityEncoder, MemoConfig, Memoizer};
pub use ports::{ExecutionProvider, ProviderJobId};

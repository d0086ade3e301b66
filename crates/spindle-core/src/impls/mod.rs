//! Impls - 実装（開発用・テスト用）
//!
//! 実際のバックエンド（バッチスケジューラ、クラウド）との統合はこのクレートの外に置きます。
//!
//! # 含まれる実装
//! - **InMemoryProvider**: 状態遷移をシミュレートする ExecutionProvider

pub mod inmem_provider;

pub use self::inmem_provider::{InMemoryProvider, JobScript};

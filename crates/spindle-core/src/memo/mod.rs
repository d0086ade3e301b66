//! Memo - タスク結果のメモ化
//!
//! - **identity**: 値 → 正規化されたバイト列
//! - **memoizer**: タスク記述子 → ハッシュ → キャッシュテーブル

pub mod identity;
pub mod memoizer;

pub use self::identity::{EncodingRule, IdentityEncoder, UnorderedCollection};
pub use self::memoizer::{Checkpoint, MemoConfig, Memoizer};

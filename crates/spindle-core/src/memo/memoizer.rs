//! Memoizer - 同じ仕事を繰り返さないためのキャッシュ
//!
//! 関数名・関数本体のハッシュ・引数・環境からキーを作り、結果のテーブルを引きます。
//!
//! 実行中の重複呼び出しをまとめることはしません。前回の結果が `update_memo`
//! 済みのときだけ効きます:
//!
//! ```text
//!   効かない:                   効く:
//!
//!    TaskA                       TaskB
//!      |   TaskA                   |
//!      |     |   TaskA           done  (TaskB)
//!      |     |     |                         (TaskB)
//!    done    |     |
//!          done    |
//!                done
//! ```
//!
//! # 並行性
//! テーブルは `DashMap` なので、異なるキーへの操作は互いに独立です。
//! 同じキーへの「ミス → あとで update」は原子的ではありません。同一タスクが
//! 並行に走れば両方が計算して両方が書き込みます（後勝ち）。直列化は呼び出し側の責務です。
//!
//! # 衝突
//! ダイジェストは元の入力と照合しません。衝突した 2 つのタスクは黙って
//! 同じエントリを共有します。`Memoizer::with_digest` でより強いハッシュに差し替え可能です。

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::identity::IdentityEncoder;
use crate::domain::{MemoError, TaskDescriptor};
use crate::ports::{Digest, DigestAlgorithm};

/// Externally persisted snapshot of the memo table: hex digest -> result.
pub type Checkpoint<R = serde_json::Value> = HashMap<String, R>;

/// Memoizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    pub enabled: bool,
    pub digest: DigestAlgorithm,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            digest: DigestAlgorithm::default(),
        }
    }
}

pub struct Memoizer<R = serde_json::Value> {
    enabled: bool,
    table: DashMap<String, R>,
    encoder: IdentityEncoder,
    digest: Box<dyn Digest>,
}

impl<R: Clone> Memoizer<R> {
    /// `checkpoint` は明示的に渡す（空でもよい）。共有されるデフォルトは持たない。
    pub fn new(enabled: bool, checkpoint: Checkpoint<R>) -> Self {
        Self::with_digest(enabled, checkpoint, DigestAlgorithm::default().build())
    }

    pub fn from_config(config: &MemoConfig, checkpoint: Checkpoint<R>) -> Self {
        Self::with_digest(config.enabled, checkpoint, config.digest.build())
    }

    pub fn with_digest(enabled: bool, checkpoint: Checkpoint<R>, digest: Box<dyn Digest>) -> Self {
        let table = if enabled {
            tracing::info!(
                entries = checkpoint.len(),
                digest = digest.name(),
                "task caching initialized"
            );
            checkpoint.into_iter().collect()
        } else {
            tracing::info!("task caching disabled for all tasks");
            DashMap::new()
        };
        Self {
            enabled,
            table,
            encoder: IdentityEncoder::new(),
            digest,
        }
    }

    /// Replace the identity encoder (e.g. one with custom rules registered).
    pub fn with_encoder(mut self, encoder: IdentityEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn encoder(&self) -> &IdentityEncoder {
        &self.encoder
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Hash `[func_name, fn_hash, args, kwargs, env]`, in that order.
    ///
    /// Pure: the same descriptor content always gives the same hash, across
    /// processes too.
    pub fn make_hash(&self, task: &TaskDescriptor) -> Result<String, MemoError> {
        let parts = [
            self.encoder.identity_str(&task.func_name)?,
            self.encoder.identity_str(&task.fn_hash)?,
            self.encoder.identity_seq(&task.args)?,
            self.encoder.identity_kwargs(&task.kwargs)?,
            self.encoder.identity(&task.env)?,
        ];
        Ok(self.digest.hex_digest(&parts.concat()))
    }

    /// Look the task up in the memo table.
    ///
    /// - `Ok(None)`: no cached result (or memoization is off for this task)
    /// - `Ok(Some(result))`: cached result, which may itself be an "empty" value
    ///   such as `serde_json::Value::Null`
    ///
    /// Sets `task.hashsum` to the computed hash. It is `None` when memoization is
    /// off or hashing failed.
    pub fn check_memo(&self, task: &mut TaskDescriptor) -> Result<Option<R>, MemoError> {
        if !self.enabled || !task.memoize {
            task.hashsum = None;
            tracing::debug!(task_id = %task.task_id, "no memoization");
            return Ok(None);
        }

        task.hashsum = None;
        let hashsum = self.make_hash(task)?;
        tracing::info!(task_id = %task.task_id, hash = %hashsum, "task has hash");

        let result = self.table.get(&hashsum).map(|entry| entry.value().clone());
        if result.is_some() {
            tracing::info!(task_id = %task.task_id, "task using result from cache");
        } else {
            tracing::info!(task_id = %task.task_id, "task had no result in cache");
        }

        task.hashsum = Some(hashsum);
        Ok(result)
    }

    /// Direct lookup for callers that expect the hash to exist (e.g. checkpoint restore).
    pub fn hash_lookup(&self, hashsum: &str) -> Result<R, MemoError> {
        self.table
            .get(hashsum)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MemoError::NotFound(hashsum.to_string()))
    }

    /// Record `result` for the task's hash. Last write wins.
    ///
    /// No-op when memoization is off for the task, or when the task was never
    /// hashed by `check_memo`.
    pub fn update_memo(&self, task: &TaskDescriptor, result: R) {
        if !self.enabled || !task.memoize {
            return;
        }
        let Some(hashsum) = task.hashsum.as_ref() else {
            tracing::debug!(task_id = %task.task_id, "task has no hashsum, skipping memo update");
            return;
        };

        if self.table.insert(hashsum.clone(), result).is_some() {
            // 再実行か衝突か、この層では区別できない
            tracing::info!(
                task_id = %task.task_id,
                func_name = %task.func_name,
                hash = %hashsum,
                "updating cache entry with latest call"
            );
        }
    }

    /// Snapshot of the whole table, for an external checkpoint writer.
    pub fn checkpoint(&self) -> Checkpoint<R> {
        self.table
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoValue, TaskId};
    use crate::ports::Sha512Digest;
    use rstest::rstest;
    use serde_json::{Value, json};
    use ulid::Ulid;

    fn task() -> TaskDescriptor {
        TaskDescriptor::new(TaskId::from_ulid(Ulid::new()), "f", "h1", "e")
            .with_args([MemoValue::Int(1), MemoValue::Int(2)])
    }

    #[test]
    fn make_hash_ignores_task_id_and_hashsum() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let a = task();
        let mut b = task();
        b.hashsum = Some("stale".to_string());

        assert_ne!(a.task_id, b.task_id);
        assert_eq!(memo.make_hash(&a).unwrap(), memo.make_hash(&b).unwrap());
    }

    #[test]
    fn make_hash_is_stable_across_memoizers() {
        let first: Memoizer = Memoizer::new(true, Checkpoint::new());
        let second: Memoizer = Memoizer::new(false, Checkpoint::new());
        assert_eq!(first.make_hash(&task()).unwrap(), second.make_hash(&task()).unwrap());
    }

    #[test]
    fn make_hash_is_pinned_for_a_known_descriptor() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        assert_eq!(
            memo.make_hash(&task()).unwrap(),
            "fa19c8b45d7eb5e4e3d80bac87fb332a30361ca140daddf73642d7c90fe0d9e7"
        );
    }

    #[test]
    fn kwargs_order_does_not_change_hash() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let a = task().with_kwarg("a", 3).with_kwarg("b", 4);
        let b = task().with_kwarg("b", 4).with_kwarg("a", 3);
        assert_eq!(memo.make_hash(&a).unwrap(), memo.make_hash(&b).unwrap());
    }

    fn altered(field: &str) -> TaskDescriptor {
        let mut t = task();
        match field {
            "func_name" => t.func_name = "g".into(),
            "fn_hash" => t.fn_hash = "h2".into(),
            "args" => t.args.reverse(),
            "kwargs" => {
                t.kwargs.insert("x".into(), MemoValue::Int(1));
            }
            "env" => t.env = MemoValue::str("other"),
            other => panic!("unknown field {other}"),
        }
        t
    }

    #[rstest]
    #[case::func_name("func_name")]
    #[case::fn_hash("fn_hash")]
    #[case::args_order("args")]
    #[case::kwargs("kwargs")]
    #[case::env("env")]
    fn every_input_field_changes_the_hash(#[case] field: &str) {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        assert_ne!(
            memo.make_hash(&task()).unwrap(),
            memo.make_hash(&altered(field)).unwrap()
        );
    }

    #[test]
    fn digest_is_pluggable() {
        let memo: Memoizer = Memoizer::with_digest(true, Checkpoint::new(), Box::new(Sha512Digest));
        assert_eq!(memo.make_hash(&task()).unwrap().len(), 128);
    }

    #[rstest]
    #[case::globally_disabled(false, true)]
    #[case::task_opted_out(true, false)]
    fn disabled_check_returns_miss_without_hashing(
        #[case] enabled: bool,
        #[case] task_memoize: bool,
    ) {
        let memo: Memoizer = Memoizer::new(enabled, Checkpoint::new());
        // 未対応の種類を入れておけば、ハッシュ計算した時点でエラーになる
        let mut t = task().with_memoize(task_memoize);
        t.env = MemoValue::custom("socket", json!(null));
        t.hashsum = Some("stale".to_string());

        assert_eq!(memo.check_memo(&mut t).unwrap(), None);
        assert_eq!(t.hashsum, None);
    }

    #[rstest]
    #[case::globally_disabled(false, true)]
    #[case::task_opted_out(true, false)]
    fn disabled_update_is_a_no_op(#[case] enabled: bool, #[case] task_memoize: bool) {
        let memo: Memoizer = Memoizer::new(enabled, Checkpoint::new());
        let mut t = task().with_memoize(task_memoize);
        t.hashsum = Some("abc".to_string());

        memo.update_memo(&t, json!(42));
        assert!(memo.is_empty());
    }

    #[test]
    fn disabled_memoizer_ignores_checkpoint() {
        let seeded: Memoizer = Memoizer::new(true, Checkpoint::new());
        let hash = seeded.make_hash(&task()).unwrap();
        let checkpoint = Checkpoint::from([(hash, json!(1))]);

        let memo: Memoizer = Memoizer::new(false, checkpoint);
        assert!(memo.is_empty());
        assert_eq!(memo.check_memo(&mut task()).unwrap(), None);
    }

    #[test]
    fn check_memo_sets_hashsum_on_miss() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut t = task();

        assert_eq!(memo.check_memo(&mut t).unwrap(), None);
        assert_eq!(t.hashsum, Some(memo.make_hash(&t).unwrap()));
    }

    #[test]
    fn cached_null_is_distinguishable_from_miss() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut first = task();
        memo.check_memo(&mut first).unwrap();
        memo.update_memo(&first, Value::Null);

        let mut second = task();
        assert_eq!(memo.check_memo(&mut second).unwrap(), Some(Value::Null));
    }

    #[test]
    fn checkpoint_seeds_the_table() {
        let hasher: Memoizer = Memoizer::new(true, Checkpoint::new());
        let hash = hasher.make_hash(&task()).unwrap();

        let checkpoint = Checkpoint::from([(hash.clone(), json!("cached"))]);
        let memo: Memoizer = Memoizer::new(true, checkpoint);
        assert_eq!(memo.check_memo(&mut task()).unwrap(), Some(json!("cached")));
        assert_eq!(memo.hash_lookup(&hash).unwrap(), json!("cached"));
    }

    #[test]
    fn hash_lookup_missing_is_not_found() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let err = memo.hash_lookup("deadbeef").unwrap_err();
        assert!(matches!(err, MemoError::NotFound(hash) if hash == "deadbeef"));
    }

    #[test]
    fn update_overwrites_existing_entry() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut t = task();
        memo.check_memo(&mut t).unwrap();

        memo.update_memo(&t, json!(1));
        memo.update_memo(&t, json!(2));

        assert_eq!(memo.len(), 1);
        assert_eq!(memo.check_memo(&mut task()).unwrap(), Some(json!(2)));
    }

    #[test]
    fn update_without_hashsum_is_skipped() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        memo.update_memo(&task(), json!(1));
        assert!(memo.is_empty());
    }

    #[test]
    fn unsupported_input_propagates_from_check_memo() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut t = task().with_args([MemoValue::custom("file_handle", json!(3))]);

        let err = memo.check_memo(&mut t).unwrap_err();
        assert!(matches!(err, MemoError::UnsupportedType(_)));
        assert_eq!(t.hashsum, None);
    }

    #[test]
    fn failed_recheck_clears_previous_hashsum() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut t = task();
        memo.check_memo(&mut t).unwrap();
        assert!(t.hashsum.is_some());

        t.env = MemoValue::custom("socket", json!(null));
        assert!(memo.check_memo(&mut t).is_err());
        assert_eq!(t.hashsum, None);

        memo.update_memo(&t, json!(1));
        assert!(memo.is_empty());
    }

    #[test]
    fn checkpoint_snapshot_round_trips_into_new_memoizer() {
        let memo: Memoizer = Memoizer::new(true, Checkpoint::new());
        let mut t = task();
        memo.check_memo(&mut t).unwrap();
        memo.update_memo(&t, json!({ "rows": 3 }));

        let restored: Memoizer = Memoizer::new(true, memo.checkpoint());
        assert_eq!(restored.check_memo(&mut task()).unwrap(), Some(json!({ "rows": 3 })));
    }

    #[test]
    fn generic_result_type() {
        let memo: Memoizer<Option<u32>> = Memoizer::new(true, Checkpoint::<Option<u32>>::new());
        let mut t = task();
        memo.check_memo(&mut t).unwrap();
        memo.update_memo(&t, None);

        assert_eq!(memo.check_memo(&mut task()).unwrap(), Some(None));
    }

    #[test]
    fn config_selects_digest() {
        let config: MemoConfig = serde_json::from_value(json!({ "digest": "sha512" })).unwrap();
        assert!(config.enabled);

        let memo: Memoizer = Memoizer::from_config(&config, Checkpoint::new());
        assert_eq!(memo.make_hash(&task()).unwrap().len(), 128);
    }
}

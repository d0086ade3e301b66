use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::TaskId;
use super::value::MemoValue;

/// Task descriptor: the inputs the scheduler hands to the memoizer.
///
/// The scheduler owns this record. The memoizer only reads the input fields
/// and annotates `hashsum` during `check_memo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub func_name: String,

    /// Identity of the function body (an opaque hash supplied by the caller).
    pub fn_hash: String,
    pub args: Vec<MemoValue>,
    pub kwargs: IndexMap<String, MemoValue>,
    pub env: MemoValue,

    /// Per-task opt-in; ignored when the memoizer itself is disabled.
    #[serde(default = "default_memoize")]
    pub memoize: bool,

    /// Set by `check_memo`: `Some(hash)` when the task was hashed, `None` otherwise.
    #[serde(default)]
    pub hashsum: Option<String>,
}

fn default_memoize() -> bool {
    true
}

impl TaskDescriptor {
    pub fn new(
        task_id: TaskId,
        func_name: impl Into<String>,
        fn_hash: impl Into<String>,
        env: impl Into<MemoValue>,
    ) -> Self {
        Self {
            task_id,
            func_name: func_name.into(),
            fn_hash: fn_hash.into(),
            args: Vec::new(),
            kwargs: IndexMap::new(),
            env: env.into(),
            memoize: true,
            hashsum: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = MemoValue>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<MemoValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }
}

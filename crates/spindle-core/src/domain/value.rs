//! MemoValue - メモ化の対象になる値の種類
//!
//! 実行時の型で dispatch する代わりに、サポートする値の種類を閉じた enum で表現します。
//! 未知の種類は `Custom` として運び、`IdentityEncoder` に明示的にルールが登録
//! されていない限りエラーになります。

use serde::{Deserialize, Serialize};

/// A reference to a callable, identified by where it lives rather than by its body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub module: String,
    pub name: String,
}

impl FunctionRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

/// A value that can take part in a memo hash.
///
/// `Dict` keeps its entries in insertion order; canonical ordering is applied by
/// the encoder, not here, so two dicts that differ only in entry order compare
/// unequal with `==` but share an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemoValue {
    None,
    Bool(bool),
    Int(i64),

    /// Integers above `i64::MAX`. Values that fit in `i64` share `Int`'s identity.
    UInt(u64),
    Float(f64),
    Str(String),
    Function(FunctionRef),
    List(Vec<MemoValue>),
    Dict(Vec<(MemoValue, MemoValue)>),

    /// A value kind the core has no built-in rule for.
    Custom {
        kind: String,
        value: serde_json::Value,
    },
}

impl MemoValue {
    pub fn str(s: impl Into<String>) -> Self {
        MemoValue::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = MemoValue>) -> Self {
        MemoValue::List(items.into_iter().collect())
    }

    /// Build a dict from `(key, value)` pairs, keeping the given order.
    pub fn dict<K: Into<MemoValue>, V: Into<MemoValue>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        MemoValue::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn custom(kind: impl Into<String>, value: serde_json::Value) -> Self {
        MemoValue::Custom {
            kind: kind.into(),
            value,
        }
    }

    /// Name of the value kind, used in logs and error messages.
    pub fn kind_name(&self) -> &str {
        match self {
            MemoValue::None => "none",
            MemoValue::Bool(_) => "bool",
            MemoValue::Int(_) | MemoValue::UInt(_) => "int",
            MemoValue::Float(_) => "float",
            MemoValue::Str(_) => "str",
            MemoValue::Function(_) => "function",
            MemoValue::List(_) => "list",
            MemoValue::Dict(_) => "dict",
            MemoValue::Custom { kind, .. } => kind,
        }
    }
}

impl From<&str> for MemoValue {
    fn from(s: &str) -> Self {
        MemoValue::Str(s.to_string())
    }
}

impl From<String> for MemoValue {
    fn from(s: String) -> Self {
        MemoValue::Str(s)
    }
}

impl From<i64> for MemoValue {
    fn from(v: i64) -> Self {
        MemoValue::Int(v)
    }
}

impl From<i32> for MemoValue {
    fn from(v: i32) -> Self {
        MemoValue::Int(v.into())
    }
}

impl From<u64> for MemoValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(MemoValue::UInt(v), MemoValue::Int)
    }
}

impl From<f64> for MemoValue {
    fn from(v: f64) -> Self {
        MemoValue::Float(v)
    }
}

impl From<bool> for MemoValue {
    fn from(v: bool) -> Self {
        MemoValue::Bool(v)
    }
}

impl From<FunctionRef> for MemoValue {
    fn from(f: FunctionRef) -> Self {
        MemoValue::Function(f)
    }
}

impl<T: Into<MemoValue>> From<Option<T>> for MemoValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(MemoValue::None, Into::into)
    }
}

impl<T: Into<MemoValue>> From<Vec<T>> for MemoValue {
    fn from(items: Vec<T>) -> Self {
        MemoValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// JSON の値をそのまま対応する種類に写像します。
///
/// i64 に収まらない正の整数は `UInt`、小数は `Float` になります。
impl From<serde_json::Value> for MemoValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => MemoValue::None,
            Value::Bool(b) => MemoValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => MemoValue::Int(i),
                (None, Some(u)) => MemoValue::UInt(u),
                (None, None) => MemoValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MemoValue::Str(s),
            Value::Array(items) => MemoValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => MemoValue::Dict(
                map.into_iter()
                    .map(|(k, v)| (MemoValue::Str(k), v.into()))
                    .collect(),
            ),
        }
    }
}

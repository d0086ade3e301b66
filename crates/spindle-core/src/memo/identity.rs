//! IdentityEncoder - 値からメモ化用のバイト列（identity）を作る
//!
//! # 規則
//! - プリミティブ（none, bool, int, uint, float, str, function）: タグ付きフレームを
//!   serde_json でそのままシリアライズ
//! - list: 要素ごとの identity を順番どおりに並べてシリアライズ（順序は意味を持つ）
//! - dict: キーの identity でソートし、`[id(k1), id(v1), id(k2), id(v2), ...]`
//!   としてシリアライズ（挿入順は意味を持たない）。ソートするのはトップレベルの
//!   エントリだけで、ネストした値はそれぞれ再帰的に identity を計算
//! - custom: 登録されたルールがあればそれで、なければ `UnsupportedType`
//!
//! 未知の種類を汎用シリアライズで黙って処理すると、誤ったキャッシュヒットや
//! ミスの原因になるので必ずエラーにします。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::{FunctionRef, MemoError, MemoValue};

/// Wire frame for one identity. Child identities are hex-encoded so that
/// rule output that isn't UTF-8 still frames unambiguously.
#[derive(Serialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
enum Frame<'a> {
    None,
    Bool(bool),
    Int(i64),
    Uint(u64),

    /// IEEE-754 bit pattern, so NaN/-0.0 never collapse onto another value.
    Float(u64),
    Str(&'a str),
    Function { module: &'a str, name: &'a str },
    List(Vec<String>),
    Dict(Vec<String>),
    Custom { kind: &'a str, id: String },
}

/// EncodingRule は custom な種類の identity を定義する
///
/// 返すバイト列は「同じとみなす値なら同じ」でなければなりません。
pub trait EncodingRule: Send + Sync {
    fn encode(&self, value: &serde_json::Value, encoder: &IdentityEncoder)
    -> Result<Vec<u8>, MemoError>;
}

impl<F> EncodingRule for F
where
    F: Fn(&serde_json::Value) -> Result<Vec<u8>, MemoError> + Send + Sync,
{
    fn encode(
        &self,
        value: &serde_json::Value,
        _encoder: &IdentityEncoder,
    ) -> Result<Vec<u8>, MemoError> {
        self(value)
    }
}

/// Rule for set-like kinds: the payload is a JSON array whose order does not matter.
///
/// ```ignore
/// encoder.register("set", UnorderedCollection)?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct UnorderedCollection;

impl EncodingRule for UnorderedCollection {
    fn encode(
        &self,
        value: &serde_json::Value,
        encoder: &IdentityEncoder,
    ) -> Result<Vec<u8>, MemoError> {
        let serde_json::Value::Array(items) = value else {
            return Err(MemoError::UnsupportedType(format!(
                "unordered collection payload must be an array, got {value}"
            )));
        };
        let mut ids = items
            .iter()
            .map(|item| encoder.identity(&MemoValue::from(item.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort();
        let ids = ids.iter().map(hex::encode).collect();
        serialize(&Frame::List(ids))
    }
}

/// Canonical identity encoder with a registry of custom rules.
#[derive(Clone, Default)]
pub struct IdentityEncoder {
    rules: HashMap<String, Arc<dyn EncodingRule>>,
}

impl IdentityEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule for `MemoValue::Custom { kind, .. }` values.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        rule: impl EncodingRule + 'static,
    ) -> Result<(), MemoError> {
        let kind = kind.into();
        if self.rules.contains_key(&kind) {
            return Err(MemoError::DuplicateRule(kind));
        }
        self.rules.insert(kind, Arc::new(rule));
        Ok(())
    }

    pub fn registered_kinds(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    /// Compute the identity of `value`.
    pub fn identity(&self, value: &MemoValue) -> Result<Vec<u8>, MemoError> {
        tracing::debug!(kind = value.kind_name(), "computing identity for memoization");
        match value {
            MemoValue::None => serialize(&Frame::None),
            MemoValue::Bool(b) => serialize(&Frame::Bool(*b)),
            MemoValue::Int(i) => serialize(&Frame::Int(*i)),
            MemoValue::UInt(u) => match i64::try_from(*u) {
                Ok(i) => serialize(&Frame::Int(i)),
                Err(_) => serialize(&Frame::Uint(*u)),
            },
            MemoValue::Float(f) => serialize(&Frame::Float(f.to_bits())),
            MemoValue::Str(s) => self.identity_str(s),
            MemoValue::Function(FunctionRef { module, name }) => {
                serialize(&Frame::Function { module, name })
            }
            MemoValue::List(items) => self.identity_seq(items),
            MemoValue::Dict(entries) => {
                let keyed = entries
                    .iter()
                    .map(|(k, v)| Ok((self.identity(k)?, v)))
                    .collect::<Result<Vec<_>, MemoError>>()?;
                self.identity_entries(keyed)
            }
            MemoValue::Custom { kind, value } => {
                let rule = self
                    .rules
                    .get(kind)
                    .ok_or_else(|| MemoError::UnsupportedType(kind.clone()))?;
                let id = rule.encode(value, self)?;
                serialize(&Frame::Custom {
                    kind,
                    id: hex::encode(id),
                })
            }
        }
    }

    /// Same bytes as `identity(&MemoValue::Str(..))` without building the value.
    pub fn identity_str(&self, s: &str) -> Result<Vec<u8>, MemoError> {
        serialize(&Frame::Str(s))
    }

    /// Same bytes as `identity(&MemoValue::List(..))`.
    pub fn identity_seq(&self, items: &[MemoValue]) -> Result<Vec<u8>, MemoError> {
        let ids = items
            .iter()
            .map(|item| self.identity(item).map(hex::encode))
            .collect::<Result<Vec<_>, _>>()?;
        serialize(&Frame::List(ids))
    }

    /// Same bytes as `identity(&MemoValue::Dict(..))` with string keys.
    pub fn identity_kwargs(
        &self,
        kwargs: &IndexMap<String, MemoValue>,
    ) -> Result<Vec<u8>, MemoError> {
        let keyed = kwargs
            .iter()
            .map(|(k, v)| Ok((self.identity_str(k)?, v)))
            .collect::<Result<Vec<_>, MemoError>>()?;
        self.identity_entries(keyed)
    }

    fn identity_entries(&self, keyed: Vec<(Vec<u8>, &MemoValue)>) -> Result<Vec<u8>, MemoError> {
        let mut pairs = keyed
            .into_iter()
            .map(|(key_id, value)| Ok((key_id, self.identity(value)?)))
            .collect::<Result<Vec<_>, MemoError>>()?;
        // キーの identity 順。同じキーが重複していても値で順序が決まる
        pairs.sort();

        let mut normalized = Vec::with_capacity(pairs.len() * 2);
        for (key_id, value_id) in pairs {
            normalized.push(hex::encode(key_id));
            normalized.push(hex::encode(value_id));
        }
        serialize(&Frame::Dict(normalized))
    }
}

impl fmt::Debug for IdentityEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityEncoder")
            .field("rules", &self.registered_kinds())
            .finish()
    }
}

fn serialize(frame: &Frame<'_>) -> Result<Vec<u8>, MemoError> {
    Ok(serde_json::to_vec(frame)?)
}

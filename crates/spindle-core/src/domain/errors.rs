//! Errors - エラー型と分類
//!
//! - `MemoError`: identity 計算とキャッシュ参照のエラー（呼び出し元へそのまま伝播）
//! - `ProviderError`: provider 呼び出しのエラー。`ErrorKind` でリトライ可否を分類

use std::fmt;

use thiserror::Error;

/// ErrorKind は provider エラーの分類
///
/// - Transient: 一時的に投入できない（リトライ推奨）。いわゆる「ソフトな失敗」
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: バックエンド自体の障害
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Infrastructure => "infrastructure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("unsupported type for memoization: {0}")]
    UnsupportedType(String),

    #[error("an encoding rule for kind '{0}' is already registered")]
    DuplicateRule(String),

    #[error("hash not found in memo table: {0}")]
    NotFound(String),

    #[error("failed to serialize identity frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error raised by an execution provider call (`submit`, `status`, `cancel`).
#[derive(Debug, Error)]
#[error("{kind} provider error: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// "Could not submit right now": the caller may try again later.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

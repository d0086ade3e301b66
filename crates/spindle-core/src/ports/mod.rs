//! Ports - 抽象化レイヤー
//!
//! 外部のバックエンド（バッチスケジューラ、クラウド API、通信路）と
//! 差し替え可能な部品（ハッシュ関数、時計、ID 生成）へのインターフェースを定義します。

pub mod channel;
pub mod clock;
pub mod digest;
pub mod id_generator;
pub mod provider;

// 主要な trait を再エクスポート
pub use self::channel::{Channel, ChannelSlot, CommandOutput};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::digest::{Digest, DigestAlgorithm, Sha256Digest, Sha512Digest};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::provider::{
    CORES_ENV_VAR, DEFAULT_JOB_NAME, ExecutionProvider, MEMORY_GB_ENV_VAR, ProviderConfig,
    ProviderJobId, ResourceHints, ScalingConfig,
};

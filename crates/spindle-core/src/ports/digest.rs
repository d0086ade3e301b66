//! Digest port - メモ化キーのハッシュ関数の抽象化
//!
//! ハッシュ値は元の入力と照合しないので、衝突すると別のタスク同士が
//! キャッシュを共有してしまいます。より強いアルゴリズムに差し替えられるよう
//! trait にしています。

use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

/// Digest reduces concatenated identities to a fixed-length hex key.
pub trait Digest: Send + Sync {
    fn hex_digest(&self, bytes: &[u8]) -> String;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl Digest for Sha256Digest {
    fn hex_digest(&self, bytes: &[u8]) -> String {
        use sha2::Digest as _;
        hex::encode(Sha256::digest(bytes))
    }

    fn name(&self) -> &'static str {
        "sha256"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Digest;

impl Digest for Sha512Digest {
    fn hex_digest(&self, bytes: &[u8]) -> String {
        use sha2::Digest as _;
        hex::encode(Sha512::digest(bytes))
    }

    fn name(&self) -> &'static str {
        "sha512"
    }
}

/// Config-level selector for the built-in digests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn build(self) -> Box<dyn Digest> {
        match self {
            DigestAlgorithm::Sha256 => Box::new(Sha256Digest),
            DigestAlgorithm::Sha512 => Box::new(Sha512Digest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sha256(DigestAlgorithm::Sha256, 64)]
    #[case::sha512(DigestAlgorithm::Sha512, 128)]
    fn digests_are_fixed_length_hex(#[case] algorithm: DigestAlgorithm, #[case] len: usize) {
        let digest = algorithm.build();
        let short = digest.hex_digest(b"a");
        let long = digest.hex_digest(&[7u8; 10_000]);

        assert_eq!(short.len(), len);
        assert_eq!(long.len(), len);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            Sha256Digest.hex_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

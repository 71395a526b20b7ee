//! Hash algorithms and normalized lookup keys.

use crate::error::{HashDbError, Result};
use serde::Serialize;
use std::fmt;

/// Hash algorithms a database or index can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
    ];

    /// Digest length in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    /// Digest length in hex characters.
    pub const fn hex_len(self) -> usize {
        self.byte_len() * 2
    }

    /// Infer the algorithm from a raw digest length.
    pub fn from_byte_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.byte_len() == len)
    }

    /// Infer the algorithm from a hex digest length.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.hex_len() == len)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(HashAlgorithm::Md5),
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha256" => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hash value normalized to raw bytes and tagged with its algorithm.
///
/// Both the textual and the raw lookup forms end up here, so backends only
/// ever compare one representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashKey {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl HashKey {
    /// Parse a hexadecimal hash. The algorithm follows from the length.
    pub fn from_hex(op: &'static str, hash: &str) -> Result<Self> {
        let hash = hash.trim();
        let algorithm = HashAlgorithm::from_hex_len(hash.len()).ok_or_else(|| {
            HashDbError::argument(op, format!("invalid hash length {} for {:?}", hash.len(), hash))
        })?;
        let bytes = hex::decode(hash)
            .map_err(|e| HashDbError::argument(op, format!("invalid hash {:?}: {}", hash, e)))?;
        Ok(Self { algorithm, bytes })
    }

    /// Wrap a raw digest. The algorithm follows from the length.
    pub fn from_raw(op: &'static str, bytes: &[u8]) -> Result<Self> {
        let algorithm = HashAlgorithm::from_byte_len(bytes.len()).ok_or_else(|| {
            HashDbError::argument(op, format!("invalid raw hash length {}", bytes.len()))
        })?;
        Ok(Self {
            algorithm,
            bytes: bytes.to_vec(),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex form, as stored in index files.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Returns true when `s` is a hex string of exactly `len` characters.
pub(crate) fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_from_hex_length() {
        let md5 = HashKey::from_hex("test", "d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(md5.algorithm(), HashAlgorithm::Md5);

        let sha1 = HashKey::from_hex("test", "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
        assert_eq!(sha1.algorithm(), HashAlgorithm::Sha1);
        assert_eq!(sha1.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");

        let sha256 = HashKey::from_hex(
            "test",
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        )
        .unwrap();
        assert_eq!(sha256.algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_hex_rejects_bad_length_and_digits() {
        assert!(HashKey::from_hex("test", "abc").is_err());
        assert!(HashKey::from_hex("test", "").is_err());
        let err = HashKey::from_hex("test", "zz1d8cd98f00b204e9800998ecf8427e").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Argument);
    }

    #[test]
    fn test_raw_lengths() {
        for len in [16usize, 20, 32] {
            assert!(HashKey::from_raw("test", &vec![0u8; len]).is_ok());
        }
        for len in [0usize, 1, 15, 17, 21, 31, 33, 64] {
            assert!(HashKey::from_raw("test", &vec![0u8; len]).is_err(), "len {}", len);
        }
    }
}

// src/hash.rs

//! Hash algorithms recognised in distfile manifests
//!
//! Manifests carry several digests per distfile. Only the algorithms listed
//! here are written back out, in a fixed strongest-first order so that the
//! output is deterministic regardless of which digests a file carries:
//!
//! | Algorithm | Manifest tag | Notes |
//! |-----------|--------------|-------|
//! | BLAKE2b   | `BLAKE2B`    | Preferred |
//! | SHA-512   | `SHA512`     | |
//! | SHA-256   | `SHA256`     | Older manifests |
//! | MD5       | `MD5`        | Legacy only |
//!
//! The raw manifest content is fingerprinted with MD5 for change detection.

use md5::{Digest, Md5};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Hash algorithm selection, declared strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum HashAlgorithm {
    Blake2b,
    Sha512,
    Sha256,
    Md5,
}

impl HashAlgorithm {
    /// Lowercase key used in parsed hash maps
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blake2b => "blake2b",
            Self::Sha512 => "sha512",
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }

    /// Uppercase tag written in manifest lines
    #[inline]
    pub const fn manifest_tag(&self) -> &'static str {
        match self {
            Self::Blake2b => "BLAKE2B",
            Self::Sha512 => "SHA512",
            Self::Sha256 => "SHA256",
            Self::Md5 => "MD5",
        }
    }

    /// All supported algorithms in output order
    pub fn output_order() -> impl Iterator<Item = HashAlgorithm> {
        HashAlgorithm::iter()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blake2b" => Ok(Self::Blake2b),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "md5" => Ok(Self::Md5),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hash lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown hash algorithm name
    UnknownAlgorithm(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => write!(f, "unknown hash algorithm: {}", name),
        }
    }
}

impl std::error::Error for HashError {}

/// MD5 of raw content as lowercase hex, used to detect manifest changes
pub fn content_md5(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

//! Identity generator
//!
//! Derives a short, deterministic slug from an object key. The slug
//! doubles as the idempotency anchor handed to downstream schedulers
//! (run name / DAG run id) and as a human-stable artifact name.
//!
//! Keys are never URL-decoded: a percent-encoded key produces a
//! percent-encoded-looking identity. Receivers see exactly the key the
//! storage provider reported.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Maximal runs of characters outside `[A-Za-z0-9_.-]`
static UNSAFE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("valid regex"));

/// Same class, but `/` is preserved
static UNSAFE_RUN_KEEP_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_./-]+").expect("valid regex"));

/// How an identity is derived from an object key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityMode {
    /// First `length` hex characters of SHA-256(key)
    HashPrefix,
    /// Sanitized substring after the last `/`
    Basename,
    /// Sanitized full key, `/` preserved
    KeyPath,
}

impl Default for IdentityMode {
    fn default() -> Self {
        Self::HashPrefix
    }
}

impl IdentityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityMode::HashPrefix => "hash-prefix",
            IdentityMode::Basename => "basename",
            IdentityMode::KeyPath => "key-path",
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IdentityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash-prefix" | "hashprefix" => Ok(IdentityMode::HashPrefix),
            "basename" => Ok(IdentityMode::Basename),
            "key-path" | "keypath" => Ok(IdentityMode::KeyPath),
            other => Err(Error::InvalidConfig(format!(
                "unknown identity mode: {}",
                other
            ))),
        }
    }
}

/// Derive the identity slug for an object key.
///
/// Deterministic for a given `(key, mode, length)`; depends on nothing
/// else. `length` only applies to [`IdentityMode::HashPrefix`].
pub fn identity(key: &str, mode: IdentityMode, length: usize) -> String {
    match mode {
        IdentityMode::HashPrefix => {
            let mut hasher = Sha256::new();
            hasher.update(key.as_bytes());
            let digest = hex::encode(hasher.finalize());
            let length = length.min(digest.len());
            digest[..length].to_string()
        }
        IdentityMode::Basename => {
            let base = key.rsplit('/').next().unwrap_or(key);
            UNSAFE_RUN.replace_all(base, "-").into_owned()
        }
        IdentityMode::KeyPath => UNSAFE_RUN_KEEP_SLASH.replace_all(key, "-").into_owned(),
    }
}

//! Pointer types used throughout the Nomad core.
//!
//! A [`ContentPointer`] addresses immutable content by its SHA-256 digest.
//! A [`MutablePointer`] names a key identity that can be repointed over time.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Immutable, content-derived address.
///
/// Identical content always yields the identical pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentPointer(String);

impl ContentPointer {
    /// Computes the pointer of raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Computes the pointer of a value's canonical encoding.
    pub fn of_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::of_bytes(&canonical_bytes(value)?))
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentPointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(Error::InvalidPointer(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Encodes a value the way it is content-addressed.
///
/// Struct fields serialize in declaration order and every set in the data
/// model is a `BTreeSet`, so equal values produce equal bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// A named, republishable reference modelling a peer-owned identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutablePointer(String);

impl MutablePointer {
    /// Generates a fresh key identity.
    #[must_use]
    pub fn generate() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(Uuid::new_v4().as_bytes());
        Self(format!("k{}", hex::encode(hasher.finalize())))
    }

    /// Wraps an existing identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutablePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MutablePointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::InvalidPointer(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// A key known to the local keyring: its local name and public identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Local name of the key.
    pub name: String,
    /// Public identity the key publishes under.
    pub id: MutablePointer,
}

impl KeyInfo {
    /// Creates key info from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, id: MutablePointer) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

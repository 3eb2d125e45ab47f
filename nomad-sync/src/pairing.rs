//! Pairing messages for admitting a second peer into a roaming tree.
//!
//! The flow, with A holding the tree and B joining it:
//! 1. A generates a [`PairingCode`] and shares it out of band
//! 2. A sends a [`PairingOffer`] carrying the exported roaming key and A's
//!    local stream identity
//! 3. B imports the roaming key, creates its own local stream, admits A's
//!    stream as a source and replies with a [`PairingAnswer`]
//! 4. A admits B's local stream as a source
//!
//! Moving these messages between peers is the job of an external transport.

use crate::error::{SyncError, SyncResult};
use nomad_store::ExportedKey;
use nomad_types::MutablePointer;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Characters a pairing code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of each half of a pairing code.
const HALF_LEN: usize = 4;

/// A short code both peers enter to bind a pairing exchange.
///
/// The first half names the rendezvous room, the second half is the
/// password that is never sent in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCode {
    room: String,
    password: String,
}

impl PairingCode {
    /// Generates a new random code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut half = || -> String {
            (0..HALF_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect()
        };
        let room = half();
        let password = half();
        Self { room, password }
    }

    /// Parses user input, ignoring case, whitespace and dashes.
    pub fn parse(input: &str) -> SyncResult<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() != HALF_LEN * 2 || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(SyncError::InvalidPairingCode(input.to_string()));
        }

        let (room, password) = normalized.split_at(HALF_LEN);
        Ok(Self {
            room: room.to_string(),
            password: password.to_string(),
        })
    }

    /// The rendezvous room.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// The shared password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// SHA-256 of the full code, used to bind messages to it.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.room.as_bytes());
        hasher.update(self.password.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn verify(&self, code_hash: &str) -> SyncResult<()> {
        if self.hash() == code_hash {
            Ok(())
        } else {
            Err(SyncError::PairingMismatch(format!(
                "message was not issued for room {}",
                self.room
            )))
        }
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.room, self.password)
    }
}

/// Sent by the peer that already holds the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingOffer {
    pub code_hash: String,
    /// Name of the shared folder.
    pub folder_name: String,
    /// The roaming key, so the joining peer can publish snapshots.
    pub roaming_key: ExportedKey,
    /// The offering peer's local stream.
    pub local_stream: MutablePointer,
}

impl PairingOffer {
    /// Creates an offer bound to `code`.
    pub fn new(
        code: &PairingCode,
        folder_name: impl Into<String>,
        roaming_key: ExportedKey,
        local_stream: MutablePointer,
    ) -> Self {
        Self {
            code_hash: code.hash(),
            folder_name: folder_name.into(),
            roaming_key,
            local_stream,
        }
    }

    /// Checks the offer was issued for `code`.
    pub fn verify(&self, code: &PairingCode) -> SyncResult<()> {
        code.verify(&self.code_hash)
    }
}

/// Sent back by the joining peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingAnswer {
    pub code_hash: String,
    /// Roaming identity the answer is for.
    pub roaming_id: MutablePointer,
    /// The joining peer's local stream.
    pub local_stream: MutablePointer,
}

impl PairingAnswer {
    /// Creates an answer bound to `code`.
    pub fn new(code: &PairingCode, roaming_id: MutablePointer, local_stream: MutablePointer) -> Self {
        Self {
            code_hash: code.hash(),
            roaming_id,
            local_stream,
        }
    }

    /// Checks the answer was issued for `code`.
    pub fn verify(&self, code: &PairingCode) -> SyncResult<()> {
        code.verify(&self.code_hash)
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Verified caller identity, supplied by the (external) authentication
/// collaborator. The ledger never validates identities itself.
pub type AccountId = String;

/// Content-derived transaction identifier.
///
/// A domain-separated SHA-256 hash of (owner, amount, creation time, sequence
/// number). The sequence counter is owned by the ledger and strictly
/// increasing, so identifiers never collide even when timestamps do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn derive(owner: &str, amount: u64, created_at: u64, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"dally.tx");
        hasher.update(owner.as_bytes());
        hasher.update(amount.to_le_bytes());
        hasher.update(created_at.to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for TxId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

// Hex strings on the wire so ids can key JSON maps.
impl Serialize for TxId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A scheduled transaction held in escrow.
///
/// Created by `schedule`, mutated exactly once by either `execute` or the
/// administrative `cancel` (both set `executed`, terminal either way), and
/// never deleted — records are retained for audit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TransactionRecord {
    /// The identity that scheduled (and may execute) this transaction.
    pub owner: AccountId,
    /// Escrowed amount in the smallest currency unit. Always positive.
    pub amount: u64,
    /// Ledger time at creation, unix seconds.
    pub created_at: u64,
    /// Base tax rate stamped at creation, basis points. Immutable.
    pub base_rate_bps: u32,
    /// Terminal flag; set by execute or cancel, never cleared.
    pub executed: bool,
    /// Free-form transaction-type label.
    pub label: String,
}

/// A record snapshot together with its live-computed tax.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub id: TxId,
    pub record: TransactionRecord,
    pub current_tax: u64,
}

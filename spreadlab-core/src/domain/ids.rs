use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a generated signal. Unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub u64);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig-{}", self.0)
    }
}

/// Identifier of an opened position. Unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Monotonic ID allocator, owned by a single run.
#[derive(Debug, Default)]
pub struct IdGen {
    next_signal: u64,
    next_position: u64,
}

impl IdGen {
    pub fn next_signal_id(&mut self) -> SignalId {
        self.next_signal += 1;
        SignalId(self.next_signal)
    }

    pub fn next_position_id(&mut self) -> PositionId {
        self.next_position += 1;
        PositionId(self.next_position)
    }
}

/// Deterministic run ID (run label + configuration + seed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Hash a run label, its serialized configuration and seed into a stable ID.
    ///
    /// BLAKE3 keeps the ID identical across builds and platforms.
    pub fn derive(label: &str, config_json: &str, seed: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(label.as_bytes());
        hasher.update(config_json.as_bytes());
        hasher.update(&seed.to_le_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

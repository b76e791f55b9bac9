//! Handles identify a stored blob, and carry the tier it lives in.
//!
//! The textual form is `<prefix>_<id>`, where the prefix encodes the tier
//! (`inmem` or `persist`) and the id consists of [ID_LEN] lower-case hex
//! characters, e.g. `inmem_335afcab`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::HEXLOWER;
use thiserror::Error;

/// Number of hex characters in a handle id.
pub const ID_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid tier: {0:?}, must be \"inmemory\" or \"persistent\"")]
    InvalidTier(String),

    #[error("handle {0:?} is missing the '_' separator")]
    MissingSeparator(String),

    #[error("handle {0:?} has an unknown tier prefix")]
    UnknownPrefix(String),

    #[error("handle {0:?} has an invalid id, expected 8 lower-case hex characters")]
    InvalidId(String),
}

/// The storage class a blob lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Kept in memory of the daemon, lost on restart.
    InMemory,
    /// Written to the persistent backend, subject to the retention policy.
    Persistent,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::InMemory, Tier::Persistent];

    /// The label used on the wire and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::InMemory => "inmemory",
            Tier::Persistent => "persistent",
        }
    }

    /// The prefix used in handles of this tier.
    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::InMemory => "inmem",
            Tier::Persistent => "persist",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidTier(s.to_string()))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    tier: Tier,
    id: String,
}

/// Bumped for every generated handle, so two stores of the same payload in
/// the same instant still get distinct ids.
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Handle {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The key of this blob inside its tier.
    pub fn key(&self) -> &str {
        &self.id
    }

    /// Derive a fresh handle for a payload about to be stored in `tier`.
    ///
    /// The id is the hex-encoded prefix of a BLAKE3 hash over a process-wide
    /// counter, the current time and the payload. It is not a content
    /// address: storing the same payload twice yields two handles.
    /// Callers must still check the id is unused in the target tier.
    pub fn generate(tier: Tier, payload: &[u8]) -> Self {
        let counter = HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&counter.to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        hasher.update(payload);
        let hash = hasher.finalize();

        Self {
            tier,
            id: HEXLOWER.encode(&hash.as_bytes()[..ID_LEN / 2]),
        }
    }
}

impl FromStr for Handle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('_')
            .ok_or_else(|| Error::MissingSeparator(s.to_string()))?;

        let tier = Tier::from_prefix(prefix).ok_or_else(|| Error::UnknownPrefix(s.to_string()))?;

        if id.len() != ID_LEN
            || !id
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(Error::InvalidId(s.to_string()));
        }

        Ok(Self {
            tier,
            id: id.to_string(),
        })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tier.prefix(), self.id)
    }
}

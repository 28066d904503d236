//! Cache Backend Definitions
//!
//! The three storage substrates an entry can live in. Each backend is an
//! independent namespace: the same key in two backends is two entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Defaults
// =============================================================================

/// Default time-to-live applied when callers do not pick one: 5 minutes
pub const DEFAULT_TTL_MS: u64 = 300_000;

// =============================================================================
// Backend
// =============================================================================

/// Storage backend an entry is written to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process-local map, lost when the process exits
    #[default]
    Memory,
    /// Session-scoped persistent area, wiped when the session closes
    Session,
    /// Durable area shared by every process using the same directory
    Local,
}

impl Backend {
    /// All backends, in stats order
    pub const ALL: [Backend; 3] = [Backend::Memory, Backend::Session, Backend::Local];

    /// Whether entries survive a process restart
    pub fn is_persistent(&self) -> bool {
        match self {
            Backend::Memory => false,
            Backend::Session | Backend::Local => true,
        }
    }

    /// Stable index, used for per-backend arrays
    pub fn index(&self) -> usize {
        match self {
            Backend::Memory => 0,
            Backend::Session => 1,
            Backend::Local => 2,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Session => "session",
            Backend::Local => "local",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "session" => Ok(Backend::Session),
            "local" => Ok(Backend::Local),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

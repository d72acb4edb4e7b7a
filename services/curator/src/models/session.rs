//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode a session was issued under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Local-only device identity, no account
    Isolated,
    /// Account-backed identity shared across devices
    Synced,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated => write!(f, "isolated"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

/// Session entity as handed out by the session provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub device_fingerprint: String,
    pub mode: OperatingMode,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub account_id: Option<String>,
}

impl Session {
    /// Expiry is absolute; there is no sliding renewal.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A session that passed the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub session_id: String,
    pub mode: OperatingMode,
    pub account_ref: Option<String>,
    /// Identity used for quotas and draft ownership
    pub owner_key: String,
}

//! Rate limit records and status payloads

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Quota kinds, each independently configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Generation,
    Refinement,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Refinement => "refinement",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one owner on one calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub owner_key: String,
    pub day: NaiveDate,
    pub generation_count: u32,
    pub refinement_count: u32,
}

/// Usage of a single quota kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindUsage {
    pub used: u32,
    pub max: u32,
    pub enabled: bool,
}

/// Read-only quota status for an owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub owner_key: String,
    pub day: NaiveDate,
    pub generations: KindUsage,
    pub refinements: KindUsage,
}

//! Curator service models

pub mod api;
pub mod draft;
pub mod profile;
pub mod rate_limit;
pub mod session;
pub mod strategy;
pub mod track;

// Re-export for convenience
pub use api::{CommitRequest, DraftResponse, GenerateRequest, PlaylistResponse, RefineRequest};
pub use draft::{DraftStatus, PlaylistDraft};
pub use profile::UserPreferenceProfile;
pub use rate_limit::{KindUsage, LimitKind, RateLimitRecord, RateLimitStatus};
pub use session::{OperatingMode, ResolvedSession, Session};
pub use strategy::{DiscoveryStrategy, is_valid_decade};
pub use track::{CandidateTrack, Track};

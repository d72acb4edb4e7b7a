//! Curator: prompt-to-playlist generation and refinement
//!
//! A request passes the [`session::SessionGate`], reserves a daily slot with
//! the [`rate_limiter::RateLimiter`], is screened by the
//! [`validation::PromptValidator`], turned into a discovery strategy by the
//! [`strategy::StrategyGenerator`], searched through the
//! [`catalog::CatalogSearchAdapter`] and cut to size by the
//! [`assembler::PlaylistAssembler`]. Drafts can then be refined a bounded
//! number of times and finally committed.

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod rate_limiter;
pub mod refinement;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;
pub mod store;
pub mod strategy;
pub mod validation;

#[cfg(test)]
mod mock;
#[cfg(test)]
mod tests;

pub use state::AppState;

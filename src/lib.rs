//! Parity Ratings - Bayesian pairwise ratings for college football
//!
//! This crate rates competitors from win/loss results with a normal
//! pairwise-comparison model, alternating posterior rating updates with
//! calibration of a season-wide parity until both converge.

pub mod config;
pub mod error;
pub mod feed;
pub mod numeric;
pub mod rating;
pub mod report;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use rating::{EngineConfig, InitialState, RatingEngine, RunOutcome, RunPhase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

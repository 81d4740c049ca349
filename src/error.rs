//! Error types for the rating engine
//!
//! Fallible operations return `anyhow::Result`; the specific failure cases the
//! engine and its collaborators can raise are enumerated in `RatingError`.
//! Numerical trouble during a run is never an error, it is reported through
//! `rating::Diagnostic` instead.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Unknown competitor: {competitor}")]
    UnknownCompetitor { competitor: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Ratings cache error: {message}")]
    CacheError { message: String },

    #[error("Game feed error: {message}")]
    FeedError { message: String },
}

//! Bayesian pairwise rating engine
//!
//! This module provides the win-probability models, the rating update and
//! parity calibration steps, the convergence engine that alternates them,
//! the ratings cache interface, and division bridging on top of it all.

pub mod bridge;
pub mod diagnostics;
pub mod engine;
pub mod model;
pub mod parity;
pub mod storage;
pub mod update;

// Re-export commonly used types
pub use bridge::{bridge_divisions, BridgeOutcome, BridgePlan, RerateGroup};
pub use diagnostics::{Diagnostic, IntegrationErrors, Warning};
pub use engine::{
    has_converged, EngineConfig, InitialState, RatingEngine, RunOutcome, RunPhase, StepOutcome,
};
pub use model::{
    win_probability, ClosedFormModel, Estimate, ProbabilityStrategy, QuadratureModel,
    WinProbabilityModel,
};
pub use parity::{calibrate_parity, misfit_curve, Calibration, MisfitPoint, ParityBracket, ParitySearch};
pub use storage::{
    run_cached, CacheEntry, CacheSource, CachedRun, InMemoryRatingsCache, JsonFileRatingsCache,
    NoOpRatingsCache, RatingsCache, DEFAULT_CACHE_FILE,
};
pub use update::{update_ratings, EvaluationContext, UpdateOutcome};

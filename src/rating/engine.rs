//! Convergence engine
//!
//! Alternates rating updates and parity calibration until both settle.
//! Every iteration turns one immutable `RunState` into the next; the loop
//! only decides when to stop.

use crate::error::{RatingError, Result};
use crate::numeric::QuadratureOptions;
use crate::rating::diagnostics::{Diagnostic, IntegrationErrors, Warning};
use crate::rating::model::{Estimate, ProbabilityStrategy, WinProbabilityModel};
use crate::rating::parity::{self, Calibration, ParitySearch};
use crate::rating::update::{self, EvaluationContext, UpdateOutcome};
use crate::types::{competitors, Belief, CompetitorId, Deltas, Game, Ratings, RunState};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Settings consumed by `RatingEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Both the largest mean change and the parity change must fall below this
    pub convergence: f64,
    /// Parity used when the caller supplies none
    pub initial_parity: f64,
    pub max_iterations: usize,
    pub search: ParitySearch,
    pub strategy: ProbabilityStrategy,
    pub quadrature: QuadratureOptions,
    pub parity_quadrature: QuadratureOptions,
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let quadrature = QuadratureOptions::default();
        Self {
            convergence: 1e-3,
            initial_parity: 1.0,
            max_iterations: 200,
            search: ParitySearch::default(),
            strategy: ProbabilityStrategy::default(),
            quadrature,
            parity_quadrature: quadrature.with_subdivision_limit(1000),
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn with_convergence(self, convergence: f64) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn sequential(self) -> Self {
        Self {
            parallel: false,
            ..self
        }
    }

    /// Reject settings that would make a run meaningless before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.convergence.is_nan() || self.convergence < 0.0 {
            return Err(invalid(format!(
                "convergence tolerance must be non-negative, got {}",
                self.convergence
            )));
        }
        if !(self.initial_parity > 0.0) || !self.initial_parity.is_finite() {
            return Err(invalid(format!(
                "initial parity must be positive, got {}",
                self.initial_parity
            )));
        }
        if self.max_iterations == 0 {
            return Err(invalid("iteration cap must be at least 1".to_string()));
        }
        self.search.bracket.validate()?;
        if !(self.search.x_tolerance > 0.0) {
            return Err(invalid(format!(
                "parity tolerance must be positive, got {}",
                self.search.x_tolerance
            )));
        }
        if self.search.max_evaluations == 0 {
            return Err(invalid("parity search needs at least one evaluation".to_string()));
        }
        for options in [&self.quadrature, &self.parity_quadrature] {
            if options.subdivision_limit == 0 {
                return Err(invalid("quadrature subdivision limit must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> anyhow::Error {
    RatingError::InvalidInput { reason }.into()
}

/// Where a run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Initializing,
    Iterating,
    Converged,
}

/// What a run starts from. Missing pieces fall back to the prior and the
/// configured initial parity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialState {
    pub ratings: Option<Ratings>,
    pub parity: Option<f64>,
    /// Only these competitors are re-rated when set
    pub subset: Option<Vec<CompetitorId>>,
}

impl InitialState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ratings(mut self, ratings: Ratings) -> Self {
        self.ratings = Some(ratings);
        self
    }

    pub fn with_parity(mut self, parity: f64) -> Self {
        self.parity = Some(parity);
        self
    }

    pub fn with_subset(mut self, subset: Vec<CompetitorId>) -> Self {
        self.subset = Some(subset);
        self
    }
}

/// One iteration's result
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: RunState,
    pub deltas: Deltas,
    pub misfit: f64,
    pub errors: IntegrationErrors,
    pub diagnostics: Vec<Diagnostic>,
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub state: RunState,
    pub phase: RunPhase,
    /// Deltas of the last iteration
    pub deltas: Deltas,
    pub integration_errors: IntegrationErrors,
    pub warnings: Vec<Warning>,
}

impl RunOutcome {
    pub fn converged(&self) -> bool {
        self.phase == RunPhase::Converged
    }

    /// `max(largest mean change, parity change)` of the last iteration
    pub fn achieved_tolerance(&self) -> f64 {
        self.deltas.max()
    }

    pub fn parity(&self) -> f64 {
        self.state.parity
    }

    pub fn ratings(&self) -> &Ratings {
        &self.state.ratings
    }

    pub fn iterations(&self) -> usize {
        self.state.iteration
    }
}

/// Both the ratings and the parity have settled
pub fn has_converged(deltas: &Deltas, tolerance: f64) -> bool {
    deltas.rating < tolerance && deltas.parity < tolerance
}

/// Iterative rating engine
#[derive(Debug)]
pub struct RatingEngine {
    config: EngineConfig,
    model: Box<dyn WinProbabilityModel>,
}

impl RatingEngine {
    /// Create an engine using the model selected by `config.strategy`
    pub fn new(config: EngineConfig) -> Result<Self> {
        let model = config.strategy.build(config.quadrature);
        Self::with_model(config, model)
    }

    pub fn with_model(config: EngineConfig, model: Box<dyn WinProbabilityModel>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn WinProbabilityModel {
        self.model.as_ref()
    }

    fn context(&self) -> EvaluationContext<'_> {
        EvaluationContext {
            model: self.model.as_ref(),
            quadrature: self.config.quadrature,
            parity_quadrature: self.config.parity_quadrature,
            parallel: self.config.parallel,
        }
    }

    pub fn win_probability(&self, winner: &Belief, loser: &Belief, parity: f64) -> Estimate {
        self.model.win_probability(winner, loser, parity)
    }

    pub fn update_ratings(
        &self,
        games: &[Game],
        parity: f64,
        current: &Ratings,
        subset: Option<&[CompetitorId]>,
    ) -> Result<UpdateOutcome> {
        update::update_ratings(&self.context(), games, parity, current, subset)
    }

    pub fn calibrate_parity(&self, games: &[Game], ratings: &Ratings) -> Result<Calibration> {
        parity::calibrate_parity(&self.context(), games, ratings, &self.config.search)
    }

    /// Build the iteration-zero snapshot. Competitors in `games` without a
    /// supplied belief start from the prior.
    pub fn initialize(&self, games: &[Game], initial: &InitialState) -> Result<RunState> {
        if games.is_empty() {
            return Err(invalid("games list is empty".to_string()));
        }

        let parity = initial.parity.unwrap_or(self.config.initial_parity);
        if !(parity > 0.0) || !parity.is_finite() {
            return Err(invalid(format!("initial parity must be positive, got {}", parity)));
        }

        let mut ratings = initial.ratings.clone().unwrap_or_default();
        for id in competitors(games) {
            ratings.entry(id).or_insert(Belief::PRIOR);
        }

        if let Some(subset) = &initial.subset {
            if let Some(missing) = subset.iter().find(|id| !ratings.contains_key(*id)) {
                return Err(RatingError::UnknownCompetitor {
                    competitor: missing.clone(),
                }
                .into());
            }
        }

        Ok(RunState::initial(ratings, parity))
    }

    /// One iteration: ratings against the previous parity, then parity
    /// against the new ratings.
    pub fn step(
        &self,
        games: &[Game],
        state: &RunState,
        subset: Option<&[CompetitorId]>,
    ) -> Result<StepOutcome> {
        let update = self.update_ratings(games, state.parity, &state.ratings, subset)?;
        let calibration = self.calibrate_parity(games, &update.ratings)?;

        let next = RunState {
            ratings: update.ratings,
            parity: calibration.parity,
            iteration: state.iteration + 1,
        };
        let deltas = Deltas::between(state, &next, subset);

        let mut diagnostics = update.diagnostics;
        diagnostics.extend(calibration.diagnostics);

        Ok(StepOutcome {
            state: next,
            deltas,
            misfit: calibration.misfit,
            errors: update.errors.merge(calibration.errors),
            diagnostics,
        })
    }

    /// Iterate until converged or the iteration cap is reached. Hitting the
    /// cap is not an error: the last state is returned with a `NotConverged`
    /// warning.
    pub fn run(&self, games: &[Game], initial: InitialState) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let mut state = self.initialize(games, &initial)?;
        let subset = initial.subset.as_deref();
        let tolerance = self.config.convergence;

        info!(
            "Starting rating run - games: {}, competitors: {}, parity: {:.4}, tolerance: {:e}, model: {}",
            games.len(),
            state.ratings.len(),
            state.parity,
            tolerance,
            self.model.name()
        );

        let mut phase = RunPhase::Iterating;
        let mut deltas;
        let mut integration_errors = IntegrationErrors::default();
        let mut warnings = Vec::new();

        loop {
            let step = self.step(games, &state, subset)?;
            let iteration = step.state.iteration;

            for diagnostic in step.diagnostics {
                warn!("Iteration {}: {}", iteration, diagnostic);
                warnings.push(Warning {
                    iteration,
                    diagnostic,
                });
            }
            integration_errors = integration_errors.merge(step.errors);
            deltas = step.deltas;
            state = step.state;

            debug!(
                "Iteration {} - parity: {:.6}, rating delta: {:e}, parity delta: {:e}, misfit: {:.6}",
                iteration, state.parity, deltas.rating, deltas.parity, step.misfit
            );

            if has_converged(&deltas, tolerance) {
                phase = RunPhase::Converged;
                break;
            }
            if iteration >= self.config.max_iterations {
                let diagnostic = Diagnostic::NotConverged {
                    iterations: iteration,
                    deltas,
                };
                warn!("{}", diagnostic);
                warnings.push(Warning {
                    iteration,
                    diagnostic,
                });
                break;
            }
        }

        info!(
            "Rating run finished - phase: {:?}, iterations: {}, parity: {:.6}, achieved tolerance: {:e}, worst integration error: {:e}, time: {:.2}ms",
            phase,
            state.iteration,
            state.parity,
            deltas.max(),
            integration_errors.worst(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        Ok(RunOutcome {
            state,
            phase,
            deltas,
            integration_errors,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_converged_requires_both() {
        let settled = Deltas {
            rating: 1e-4,
            parity: 1e-4,
        };
        let ratings_moving = Deltas {
            rating: 1e-2,
            parity: 1e-4,
        };
        let parity_moving = Deltas {
            rating: 1e-4,
            parity: 1e-2,
        };
        assert!(has_converged(&settled, 1e-3));
        assert!(!has_converged(&ratings_moving, 1e-3));
        assert!(!has_converged(&parity_moving, 1e-3));
        // Strict comparison
        assert!(!has_converged(&settled, 1e-4));
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default().with_convergence(-1e-3).validate().is_err());
        assert!(EngineConfig::default().with_convergence(f64::NAN).validate().is_err());
        assert!(EngineConfig::default().with_max_iterations(0).validate().is_err());

        let mut config = EngineConfig::default();
        config.search.bracket.lower = 0.0;
        assert!(config.validate().is_err());

        let config = EngineConfig {
            initial_parity: 0.0,
            ..EngineConfig::default()
        };
        assert!(RatingEngine::new(config).is_err());
    }

    #[test]
    fn test_initialize_fills_missing_competitors() {
        let engine = RatingEngine::new(EngineConfig::default()).unwrap();
        let games = vec![Game::new("B", "A"), Game::new("C", "B")];
        let mut known = Ratings::new();
        known.insert("A".to_string(), Belief::new(0.4, 0.6));

        let state = engine
            .initialize(&games, &InitialState::new().with_ratings(known))
            .unwrap();
        assert_eq!(state.iteration, 0);
        assert_eq!(state.parity, 1.0);
        assert_eq!(state.ratings["A"], Belief::new(0.4, 0.6));
        assert_eq!(state.ratings["B"], Belief::PRIOR);
        assert_eq!(state.ratings["C"], Belief::PRIOR);
    }

    #[test]
    fn test_initialize_rejects_bad_input() {
        let engine = RatingEngine::new(EngineConfig::default()).unwrap();
        assert!(engine.initialize(&[], &InitialState::new()).is_err());

        let games = vec![Game::new("B", "A")];
        assert!(engine
            .initialize(&games, &InitialState::new().with_parity(-1.0))
            .is_err());
        assert!(engine
            .initialize(
                &games,
                &InitialState::new().with_subset(vec!["Nobody".to_string()])
            )
            .is_err());
    }

    #[test]
    fn test_step_advances_iteration() {
        let engine = RatingEngine::new(EngineConfig::default()).unwrap();
        let games = vec![Game::new("B", "A")];
        let state = engine.initialize(&games, &InitialState::new()).unwrap();

        let step = engine.step(&games, &state, None).unwrap();
        assert_eq!(step.state.iteration, 1);
        assert!(step.state.ratings["B"].mean > step.state.ratings["A"].mean);
        assert!(step.deltas.rating > 0.0);
        // The input snapshot is untouched
        assert_eq!(state.ratings["B"], Belief::PRIOR);
    }
}

//! Parity calibration
//!
//! For a fixed set of ratings, the parity is the value minimising the summed
//! misfit of every game: the integral over the implied margin distribution
//! of `N(y; loserMean − winnerMean, σw² + σl²) · Φ(y / (parity·√2))²`.

use crate::error::{RatingError, Result};
use crate::numeric::{gaussian_pdf, integrate_real_line, minimize_bounded};
use crate::rating::diagnostics::{Diagnostic, IntegrationErrors};
use crate::rating::update::EvaluationContext;
use crate::types::{Belief, Game, Ratings};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::f64::consts::SQRT_2;
use tracing::debug;

/// Closed search interval for the parity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParityBracket {
    pub lower: f64,
    pub upper: f64,
}

impl Default for ParityBracket {
    fn default() -> Self {
        Self {
            lower: 0.05,
            upper: 50.0,
        }
    }
}

impl ParityBracket {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lower > 0.0) || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(RatingError::InvalidInput {
                reason: format!(
                    "parity bracket [{}, {}] must satisfy 0 < lower < upper",
                    self.lower, self.upper
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Whether `parity` is within `margin` of either bound
    pub fn at_edge(&self, parity: f64, margin: f64) -> bool {
        parity - self.lower < margin || self.upper - parity < margin
    }
}

/// Settings of the bounded line search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParitySearch {
    pub bracket: ParityBracket,
    pub x_tolerance: f64,
    pub max_evaluations: usize,
}

impl Default for ParitySearch {
    fn default() -> Self {
        Self {
            bracket: ParityBracket::default(),
            x_tolerance: 1e-5,
            max_evaluations: 500,
        }
    }
}

/// Value of the misfit curve at one parity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MisfitPoint {
    pub value: f64,
    /// Summed quadrature error of the per-game integrals
    pub abs_error: f64,
    pub errors: IntegrationErrors,
    /// Per-game integrals that stopped at the subdivision limit
    pub unconverged: usize,
    pub max_subdivisions: usize,
}

/// Result of a parity calibration
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub parity: f64,
    pub misfit: f64,
    pub evaluations: usize,
    pub errors: IntegrationErrors,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy)]
struct GameTerm {
    value: f64,
    abs_error: f64,
    probability_error: f64,
    converged: bool,
    subdivisions: usize,
}

fn game_beliefs(games: &[Game], ratings: &Ratings) -> Result<Vec<(Belief, Belief)>> {
    games
        .iter()
        .map(|game| {
            let lookup = |id: &String| {
                ratings
                    .get(id)
                    .copied()
                    .ok_or_else(|| RatingError::UnknownCompetitor {
                        competitor: id.clone(),
                    })
            };
            Ok::<_, anyhow::Error>((lookup(&game.winner)?, lookup(&game.loser)?))
        })
        .collect()
}

fn game_term(ctx: &EvaluationContext<'_>, winner: &Belief, loser: &Belief, parity: f64) -> GameTerm {
    let model = ctx.model;
    let origin = Belief::point(0.0);
    let scale = parity * SQRT_2;
    let mean_diff = loser.mean - winner.mean;
    let sigma = (winner.variance() + loser.variance()).sqrt();

    let worst_probability_error = Cell::new(0.0_f64);
    let squared_cdf = |y: f64| {
        let estimate = model.win_probability(&Belief::point(y), &origin, scale);
        worst_probability_error.set(worst_probability_error.get().max(estimate.abs_error));
        estimate.value * estimate.value
    };

    if !(sigma > 0.0) {
        // Point mass at the mean difference
        return GameTerm {
            value: squared_cdf(mean_diff),
            abs_error: 0.0,
            probability_error: worst_probability_error.get(),
            converged: true,
            subdivisions: 0,
        };
    }

    let integral = integrate_real_line(
        |y| gaussian_pdf(y, mean_diff, sigma) * squared_cdf(y),
        &ctx.parity_quadrature,
    );

    GameTerm {
        value: integral.value,
        abs_error: integral.abs_error,
        probability_error: worst_probability_error.get(),
        converged: integral.converged,
        subdivisions: integral.subdivisions,
    }
}

fn curve_at(ctx: &EvaluationContext<'_>, pairs: &[(Belief, Belief)], parity: f64) -> MisfitPoint {
    let term = |(winner, loser): &(Belief, Belief)| game_term(ctx, winner, loser, parity);
    let terms: Vec<GameTerm> = if ctx.parallel {
        pairs.par_iter().map(term).collect()
    } else {
        pairs.iter().map(term).collect()
    };

    // Summed in game order so the result does not depend on scheduling
    let mut point = MisfitPoint {
        value: 0.0,
        abs_error: 0.0,
        errors: IntegrationErrors::default(),
        unconverged: 0,
        max_subdivisions: 0,
    };
    for term in terms {
        point.value += term.value;
        point.abs_error += term.abs_error;
        point.errors.record_parity(term.abs_error);
        point.errors.record_win_probability(term.probability_error);
        if !term.converged {
            point.unconverged += 1;
        }
        point.max_subdivisions = point.max_subdivisions.max(term.subdivisions);
    }
    point
}

/// Total misfit of `games` under `ratings` at a single parity value
pub fn misfit_curve(
    ctx: &EvaluationContext<'_>,
    games: &[Game],
    ratings: &Ratings,
    parity: f64,
) -> Result<MisfitPoint> {
    if !(parity > 0.0) {
        return Err(RatingError::InvalidInput {
            reason: format!("parity must be positive, got {}", parity),
        }
        .into());
    }
    let pairs = game_beliefs(games, ratings)?;
    Ok(curve_at(ctx, &pairs, parity))
}

/// Find the parity that best explains `games` under `ratings`.
///
/// The best point found is always returned. A minimum on the edge of the
/// bracket or an exhausted search is reported as a diagnostic.
pub fn calibrate_parity(
    ctx: &EvaluationContext<'_>,
    games: &[Game],
    ratings: &Ratings,
    search: &ParitySearch,
) -> Result<Calibration> {
    search.bracket.validate()?;
    if games.is_empty() {
        return Err(RatingError::InvalidInput {
            reason: "cannot calibrate parity without games".to_string(),
        }
        .into());
    }
    let pairs = game_beliefs(games, ratings)?;

    let mut errors = IntegrationErrors::default();
    let mut unconverged = 0;
    let mut max_subdivisions = 0;
    let mut worst_game_error: f64 = 0.0;

    let minimum = minimize_bounded(
        |parity| {
            let point = curve_at(ctx, &pairs, parity);
            errors = errors.merge(point.errors);
            unconverged += point.unconverged;
            max_subdivisions = max_subdivisions.max(point.max_subdivisions);
            worst_game_error = worst_game_error.max(point.errors.parity);
            point.value
        },
        search.bracket.lower,
        search.bracket.upper,
        search.x_tolerance,
        search.max_evaluations,
    );

    let mut diagnostics = Vec::new();
    if unconverged > 0 {
        diagnostics.push(Diagnostic::QuadratureLimit {
            context: format!("parity misfit ({} game integrals)", unconverged),
            subdivisions: max_subdivisions,
            abs_error: worst_game_error,
        });
    }
    if search.bracket.at_edge(minimum.x, 10.0 * search.x_tolerance) {
        diagnostics.push(Diagnostic::ParityAtBracketEdge {
            parity: minimum.x,
            lower: search.bracket.lower,
            upper: search.bracket.upper,
        });
    }
    if !minimum.converged {
        diagnostics.push(Diagnostic::ParitySearchExhausted {
            parity: minimum.x,
            evaluations: minimum.evaluations,
        });
    }

    debug!(
        "Calibrated parity {:.6} (misfit {:.6}) after {} evaluations",
        minimum.x, minimum.value, minimum.evaluations
    );

    Ok(Calibration {
        parity: minimum.x,
        misfit: minimum.value,
        evaluations: minimum.evaluations,
        errors,
        diagnostics,
    })
}

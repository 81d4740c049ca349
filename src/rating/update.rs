//! Rating update
//!
//! Re-estimates each competitor's belief against a standard normal prior,
//! holding parity and every opponent's belief fixed. The likelihood of a
//! candidate strength `x` is the product of the win probabilities of the
//! competitor's games with its own belief replaced by the point `(x, 0)`.

use crate::error::{RatingError, Result};
use crate::numeric::{integrate_real_line, normal_ln_pdf, QuadratureOptions};
use crate::rating::diagnostics::{Diagnostic, IntegrationErrors};
use crate::rating::model::WinProbabilityModel;
use crate::types::{Belief, CompetitorId, Game, Ratings};
use rayon::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;
use tracing::debug;

/// Normalisers below this are treated as a vanished posterior
pub const DEGENERATE_NORMALIZER: f64 = 1e-200;

/// Grid used to find the peak of the posterior weight
const PEAK_GRID: usize = 129;
/// How far beyond the prior and the opponents the peak search reaches
const PEAK_MARGIN: f64 = 6.0;

/// Everything needed to evaluate the model inside one update or calibration
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub model: &'a dyn WinProbabilityModel,
    /// Options for the posterior integrals
    pub quadrature: QuadratureOptions,
    /// Options for the per-game misfit integrals
    pub parity_quadrature: QuadratureOptions,
    /// Spread independent work across the rayon pool
    pub parallel: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(model: &'a dyn WinProbabilityModel) -> Self {
        let quadrature = QuadratureOptions::default();
        Self {
            model,
            quadrature,
            parity_quadrature: quadrature.with_subdivision_limit(1000),
            parallel: true,
        }
    }

    pub fn sequential(self) -> Self {
        Self {
            parallel: false,
            ..self
        }
    }
}

/// New ratings plus everything observed while computing them
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub ratings: Ratings,
    pub errors: IntegrationErrors,
    pub diagnostics: Vec<Diagnostic>,
}

/// One game seen from a competitor's side
#[derive(Debug, Clone, Copy)]
struct Fixture {
    won: bool,
    opponent: Belief,
}

struct Posterior {
    competitor: CompetitorId,
    belief: Belief,
    errors: IntegrationErrors,
    diagnostics: Vec<Diagnostic>,
}

/// Re-rate every competitor in `subset` (all of `current` when `None`).
///
/// Competitors outside the subset are copied through unchanged, as are
/// competitors without games in `games`.
pub fn update_ratings(
    ctx: &EvaluationContext<'_>,
    games: &[Game],
    parity: f64,
    current: &Ratings,
    subset: Option<&[CompetitorId]>,
) -> Result<UpdateOutcome> {
    if parity.is_nan() || parity < 0.0 {
        return Err(RatingError::InvalidInput {
            reason: format!("parity must be non-negative, got {}", parity),
        }
        .into());
    }

    let fixtures = index_fixtures(games, current)?;

    let mut targets: Vec<&CompetitorId> = match subset {
        Some(ids) => {
            for id in ids {
                if !current.contains_key(id) {
                    return Err(RatingError::UnknownCompetitor {
                        competitor: id.clone(),
                    }
                    .into());
                }
            }
            ids.iter().collect()
        }
        None => current.keys().collect(),
    };
    targets.sort();
    targets.dedup();

    let rate = |id: &&CompetitorId| {
        let previous = current[*id];
        match fixtures.get(id.as_str()) {
            Some(own) => posterior(ctx, id, own, parity, previous),
            None => Posterior {
                competitor: (*id).clone(),
                belief: previous,
                errors: IntegrationErrors::default(),
                diagnostics: Vec::new(),
            },
        }
    };

    let posteriors: Vec<Posterior> = if ctx.parallel {
        targets.par_iter().map(rate).collect()
    } else {
        targets.iter().map(rate).collect()
    };

    let mut ratings = current.clone();
    let mut errors = IntegrationErrors::default();
    let mut diagnostics = Vec::new();
    for result in posteriors {
        ratings.insert(result.competitor, result.belief);
        errors = errors.merge(result.errors);
        diagnostics.extend(result.diagnostics);
    }

    debug!(
        "Updated {} competitors at parity {:.6}, worst posterior error {:e}",
        targets.len(),
        parity,
        errors.posterior
    );

    Ok(UpdateOutcome {
        ratings,
        errors,
        diagnostics,
    })
}

fn index_fixtures<'g>(
    games: &'g [Game],
    current: &Ratings,
) -> Result<HashMap<&'g str, Vec<Fixture>>> {
    let belief_of = |id: &CompetitorId| {
        current
            .get(id)
            .copied()
            .ok_or_else(|| RatingError::UnknownCompetitor {
                competitor: id.clone(),
            })
    };

    let mut fixtures: HashMap<&str, Vec<Fixture>> = HashMap::new();
    for game in games {
        let winner = belief_of(&game.winner)?;
        let loser = belief_of(&game.loser)?;
        fixtures.entry(game.winner.as_str()).or_default().push(Fixture {
            won: true,
            opponent: loser,
        });
        fixtures.entry(game.loser.as_str()).or_default().push(Fixture {
            won: false,
            opponent: winner,
        });
    }
    Ok(fixtures)
}

/// Highest point of the log-weight on a grid spanning the prior and every
/// opponent, as `(x, log_weight)`
fn locate_peak<F: Fn(f64) -> f64>(log_weight: &F, fixtures: &[Fixture]) -> (f64, f64) {
    let (lowest, highest) = fixtures
        .iter()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), fixture| {
            (lo.min(fixture.opponent.mean), hi.max(fixture.opponent.mean))
        });
    let lower = lowest - PEAK_MARGIN;
    let step = (highest + PEAK_MARGIN - lower) / (PEAK_GRID - 1) as f64;

    (0..PEAK_GRID)
        .map(|i| {
            let x = lower + step * i as f64;
            (x, log_weight(x))
        })
        .fold((0.0, f64::NEG_INFINITY), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
}

fn posterior(
    ctx: &EvaluationContext<'_>,
    competitor: &CompetitorId,
    fixtures: &[Fixture],
    parity: f64,
    previous: Belief,
) -> Posterior {
    let model = ctx.model;
    let worst_probability_error = Cell::new(0.0_f64);

    let log_weight = |x: f64| {
        let candidate = Belief::point(x);
        let mut total = normal_ln_pdf(x);
        for fixture in fixtures {
            let estimate = if fixture.won {
                model.win_probability(&candidate, &fixture.opponent, parity)
            } else {
                model.win_probability(&fixture.opponent, &candidate, parity)
            };
            worst_probability_error.set(worst_probability_error.get().max(estimate.abs_error));
            total += estimate.value.ln();
        }
        total
    };

    let mut errors = IntegrationErrors::default();
    let mut diagnostics = Vec::new();
    let degenerate = |errors: IntegrationErrors, normalizer: f64| Posterior {
        competitor: competitor.clone(),
        belief: previous,
        errors,
        diagnostics: vec![Diagnostic::DegenerateLikelihood {
            competitor: competitor.clone(),
            normalizer,
        }],
    };

    // Integrate relative to the peak so the integrands are O(1) however
    // unlikely the competitor's results are
    let (peak, log_peak) = locate_peak(&log_weight, fixtures);
    if !log_peak.is_finite() {
        errors.record_win_probability(worst_probability_error.get());
        return degenerate(errors, 0.0);
    }
    let weight = |u: f64| (log_weight(peak + u) - log_peak).exp();

    let rel_tolerance = ctx.quadrature.rel_tolerance;
    let normalizer = integrate_real_line(
        &weight,
        &QuadratureOptions {
            abs_tolerance: 0.0,
            ..ctx.quadrature
        },
    );
    let z = normalizer.value;
    let log_normalizer = z.ln() + log_peak;
    if !z.is_finite() || !(z > 0.0) || log_normalizer < DEGENERATE_NORMALIZER.ln() {
        errors.record_win_probability(worst_probability_error.get());
        return degenerate(errors, log_normalizer.exp());
    }

    let moment_options = QuadratureOptions {
        abs_tolerance: rel_tolerance * z,
        ..ctx.quadrature
    };
    let first = integrate_real_line(|u| u * weight(u), &moment_options);
    let offset = first.value / z;
    let second = integrate_real_line(
        |u| {
            let d = offset - u;
            d * d * weight(u)
        },
        &moment_options,
    );
    let mean = peak + offset;
    let spread = (second.value / z).sqrt();
    errors.record_win_probability(worst_probability_error.get());

    if !mean.is_finite() || !(spread > 0.0) || !spread.is_finite() {
        return degenerate(errors, log_normalizer.exp());
    }

    for (name, integral) in [("normaliser", &normalizer), ("mean", &first), ("variance", &second)] {
        let relative_error = integral.abs_error / z;
        errors.record_posterior(relative_error);
        if !integral.converged || relative_error > rel_tolerance {
            diagnostics.push(Diagnostic::QuadratureLimit {
                context: format!("posterior {} of {}", name, competitor),
                subdivisions: integral.subdivisions,
                abs_error: relative_error,
            });
        }
    }

    Posterior {
        competitor: competitor.clone(),
        belief: Belief::new(mean, spread),
        errors,
        diagnostics,
    }
}

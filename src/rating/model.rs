//! Win-probability model
//!
//! The margin of a game is Normal(winnerMean − loserMean, winnerSpread² +
//! loserSpread² + parity²); the win probability is the chance that margin is
//! positive. Two interchangeable evaluation strategies are provided: the
//! closed form through the normal CDF, and quadrature of the standard normal
//! density which is kept for cross-checking the closed form.

use crate::numeric::{integrate_lower_tail, normal_cdf, normal_pdf, QuadratureOptions};
use crate::types::Belief;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A probability together with the error bound of the method that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub abs_error: f64,
}

/// Trait for evaluating the probability that `winner` beats `loser`
pub trait WinProbabilityModel: Send + Sync + std::fmt::Debug {
    fn win_probability(&self, winner: &Belief, loser: &Belief, parity: f64) -> Estimate;

    fn name(&self) -> &'static str;
}

/// `(winnerMean − loserMean) / sqrt(spreads² + parity²)`, or `None` when the
/// combined spread is zero and the outcome is deterministic.
pub fn standardized_margin(winner: &Belief, loser: &Belief, parity: f64) -> Option<f64> {
    let scale = (winner.variance() + loser.variance() + parity * parity).sqrt();
    if scale > 0.0 {
        Some((winner.mean - loser.mean) / scale)
    } else {
        None
    }
}

fn step_probability(winner: &Belief, loser: &Belief) -> f64 {
    match winner.mean.partial_cmp(&loser.mean) {
        Some(Ordering::Greater) => 1.0,
        Some(Ordering::Less) => 0.0,
        _ => 0.5,
    }
}

/// Evaluates the normal CDF directly
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedFormModel;

impl WinProbabilityModel for ClosedFormModel {
    fn win_probability(&self, winner: &Belief, loser: &Belief, parity: f64) -> Estimate {
        match standardized_margin(winner, loser, parity) {
            Some(z) => Estimate {
                value: normal_cdf(z),
                abs_error: f64::EPSILON,
            },
            None => Estimate {
                value: step_probability(winner, loser),
                abs_error: 0.0,
            },
        }
    }

    fn name(&self) -> &'static str {
        "closed_form"
    }
}

/// Integrates the standard normal density up to the standardised margin
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadratureModel {
    options: QuadratureOptions,
}

impl QuadratureModel {
    pub fn new(options: QuadratureOptions) -> Self {
        Self { options }
    }
}

impl WinProbabilityModel for QuadratureModel {
    fn win_probability(&self, winner: &Belief, loser: &Belief, parity: f64) -> Estimate {
        match standardized_margin(winner, loser, parity) {
            Some(z) => {
                // Only the small tail is integrated; its mass sits where the
                // (-∞, u] mapping samples densely.
                let tail = integrate_lower_tail(normal_pdf, -z.abs(), &self.options);
                let value = if z > 0.0 { 1.0 - tail.value } else { tail.value };
                Estimate {
                    value: value.clamp(0.0, 1.0),
                    abs_error: tail.abs_error,
                }
            }
            None => Estimate {
                value: step_probability(winner, loser),
                abs_error: 0.0,
            },
        }
    }

    fn name(&self) -> &'static str {
        "quadrature"
    }
}

/// Which model the engine evaluates win probabilities with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityStrategy {
    #[default]
    ClosedForm,
    Quadrature,
}

impl ProbabilityStrategy {
    pub fn build(&self, options: QuadratureOptions) -> Box<dyn WinProbabilityModel> {
        match self {
            ProbabilityStrategy::ClosedForm => Box::new(ClosedFormModel),
            ProbabilityStrategy::Quadrature => Box::new(QuadratureModel::new(options)),
        }
    }
}

impl std::fmt::Display for ProbabilityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbabilityStrategy::ClosedForm => write!(f, "closed_form"),
            ProbabilityStrategy::Quadrature => write!(f, "quadrature"),
        }
    }
}

impl std::str::FromStr for ProbabilityStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "closed_form" | "closed-form" | "cdf" => Ok(ProbabilityStrategy::ClosedForm),
            "quadrature" | "quad" => Ok(ProbabilityStrategy::Quadrature),
            _ => Err(anyhow::anyhow!("Unknown probability strategy: {}", s)),
        }
    }
}

/// Probability that `winner` beats `loser`, evaluated in closed form
pub fn win_probability(winner: &Belief, loser: &Belief, parity: f64) -> f64 {
    ClosedFormModel.win_probability(winner, loser, parity).value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_comparison_is_even() {
        let belief = Belief::new(0.7, 0.4);
        assert_eq!(win_probability(&belief, &belief, 1.3), 0.5);
    }

    #[test]
    fn test_known_value() {
        // margin 1 over sqrt(0.5² + 0.5² + 1²)
        let winner = Belief::new(1.0, 0.5);
        let loser = Belief::new(0.0, 0.5);
        let p = win_probability(&winner, &loser, 1.0);
        assert!((p - 0.792_891_910_878_737_4).abs() < 1e-12);
    }

    #[test]
    fn test_zero_spread_step_function() {
        let strong = Belief::point(1.0);
        let weak = Belief::point(-1.0);
        assert_eq!(win_probability(&strong, &weak, 0.0), 1.0);
        assert_eq!(win_probability(&weak, &strong, 0.0), 0.0);
        assert_eq!(win_probability(&strong, &strong, 0.0), 0.5);
        assert!(!win_probability(&strong, &weak, 0.0).is_nan());
    }

    #[test]
    fn test_strategies_agree() {
        let quadrature = QuadratureModel::default();
        let closed = ClosedFormModel;
        let pairs = [
            (Belief::new(0.35, 0.92), Belief::new(-0.35, 0.92), 1.4),
            (Belief::new(-1.5, 0.6), Belief::new(1.2, 0.7), 0.3),
            (Belief::new(2.0, 0.0), Belief::new(-2.0, 0.0), 0.05),
        ];
        for (winner, loser, parity) in pairs {
            let a = closed.win_probability(&winner, &loser, parity);
            let b = quadrature.win_probability(&winner, &loser, parity);
            assert!(
                (a.value - b.value).abs() < 1e-9,
                "{} vs {}",
                a.value,
                b.value
            );
            assert!(b.abs_error < 1e-9);
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "closed_form".parse::<ProbabilityStrategy>().unwrap(),
            ProbabilityStrategy::ClosedForm
        );
        assert_eq!(
            "Quadrature".parse::<ProbabilityStrategy>().unwrap(),
            ProbabilityStrategy::Quadrature
        );
        assert!("monte_carlo".parse::<ProbabilityStrategy>().is_err());
        assert_eq!(ProbabilityStrategy::Quadrature.build(QuadratureOptions::default()).name(), "quadrature");
    }
}

//! Numerical diagnostics attached to rating results
//!
//! Nothing in here aborts a computation. Quadrature error bounds are carried
//! in an explicit accumulator that every update and calibration returns, and
//! recoverable trouble is described by `Diagnostic` values.

use crate::types::{CompetitorId, Deltas};
use serde::{Deserialize, Serialize};

/// Worst quadrature error estimates observed, split by where they arose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationErrors {
    /// Largest error of any single win-probability evaluation
    pub win_probability: f64,
    /// Largest error of a posterior moment, relative to its normaliser
    pub posterior: f64,
    /// Largest error of a per-game misfit integral
    pub parity: f64,
}

impl IntegrationErrors {
    /// Elementwise maximum of two accumulators
    pub fn merge(self, other: IntegrationErrors) -> IntegrationErrors {
        IntegrationErrors {
            win_probability: self.win_probability.max(other.win_probability),
            posterior: self.posterior.max(other.posterior),
            parity: self.parity.max(other.parity),
        }
    }

    pub fn record_win_probability(&mut self, error: f64) {
        self.win_probability = self.win_probability.max(error);
    }

    pub fn record_posterior(&mut self, error: f64) {
        self.posterior = self.posterior.max(error);
    }

    pub fn record_parity(&mut self, error: f64) {
        self.parity = self.parity.max(error);
    }

    /// Single confidence bound covering every category
    pub fn worst(&self) -> f64 {
        self.win_probability.max(self.posterior).max(self.parity)
    }
}

/// Recoverable numerical condition observed during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// The posterior normaliser vanished; the competitor kept its previous belief
    DegenerateLikelihood {
        competitor: CompetitorId,
        normalizer: f64,
    },
    /// An integral hit its subdivision limit before reaching tolerance
    QuadratureLimit {
        context: String,
        subdivisions: usize,
        abs_error: f64,
    },
    /// The best parity lies on the edge of the search bracket
    ParityAtBracketEdge { parity: f64, lower: f64, upper: f64 },
    /// The parity search ran out of evaluations
    ParitySearchExhausted { parity: f64, evaluations: usize },
    /// The iteration cap was reached before ratings and parity settled
    NotConverged { iterations: usize, deltas: Deltas },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::DegenerateLikelihood {
                competitor,
                normalizer,
            } => write!(
                f,
                "degenerate likelihood for {} (normaliser {:e}), belief kept",
                competitor, normalizer
            ),
            Diagnostic::QuadratureLimit {
                context,
                subdivisions,
                abs_error,
            } => write!(
                f,
                "quadrature for {} stopped at {} subdivisions (error {:e})",
                context, subdivisions, abs_error
            ),
            Diagnostic::ParityAtBracketEdge {
                parity,
                lower,
                upper,
            } => write!(
                f,
                "parity {:.6} is at the edge of the bracket [{}, {}]",
                parity, lower, upper
            ),
            Diagnostic::ParitySearchExhausted {
                parity,
                evaluations,
            } => write!(
                f,
                "parity search stopped after {} evaluations at {:.6}",
                evaluations, parity
            ),
            Diagnostic::NotConverged { iterations, deltas } => write!(
                f,
                "not converged after {} iterations (rating delta {:e}, parity delta {:e})",
                iterations, deltas.rating, deltas.parity
            ),
        }
    }
}

/// A diagnostic together with the iteration that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub iteration: usize,
    pub diagnostic: Diagnostic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_takes_elementwise_maximum() {
        let a = IntegrationErrors {
            win_probability: 1e-12,
            posterior: 3e-11,
            parity: 0.0,
        };
        let b = IntegrationErrors {
            win_probability: 5e-12,
            posterior: 1e-11,
            parity: 2e-10,
        };
        let merged = a.merge(b);
        assert_eq!(merged.win_probability, 5e-12);
        assert_eq!(merged.posterior, 3e-11);
        assert_eq!(merged.parity, 2e-10);
        assert_eq!(merged.worst(), 2e-10);
    }

    #[test]
    fn test_record_keeps_worst() {
        let mut errors = IntegrationErrors::default();
        errors.record_parity(1e-9);
        errors.record_parity(1e-12);
        assert_eq!(errors.parity, 1e-9);
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::ParityAtBracketEdge {
            parity: 49.99999,
            lower: 0.05,
            upper: 50.0,
        };
        assert!(diagnostic.to_string().contains("edge of the bracket"));
    }
}

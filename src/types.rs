//! Common types used throughout the rating engine

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque identifier for a competitor (a team). Stable across a season.
pub type CompetitorId = String;

/// Current belief for every competitor of a run
pub type Ratings = HashMap<CompetitorId, Belief>;

/// Normal-distributed estimate of a competitor's latent strength
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub mean: f64,
    /// Standard deviation of the estimate. Strictly positive for rated competitors.
    pub spread: f64,
}

impl Belief {
    /// Standard-normal prior assigned to a competitor the first time it is seen
    pub const PRIOR: Belief = Belief {
        mean: 0.0,
        spread: 1.0,
    };

    pub fn new(mean: f64, spread: f64) -> Self {
        Self { mean, spread }
    }

    /// A belief with no uncertainty, used for candidate strengths during integration
    pub fn point(mean: f64) -> Self {
        Self { mean, spread: 0.0 }
    }

    pub fn variance(&self) -> f64 {
        self.spread * self.spread
    }

    /// Map a belief onto another scale: `mean * scale + mean_offset`,
    /// `spread * scale + spread_offset`.
    pub fn rescale(&self, scale: f64, mean_offset: f64, spread_offset: f64) -> Self {
        Self {
            mean: self.mean * scale + mean_offset,
            spread: self.spread * scale + spread_offset,
        }
    }
}

impl Default for Belief {
    fn default() -> Self {
        Self::PRIOR
    }
}

impl std::fmt::Display for Belief {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3},  σ = {:.3}", self.mean, self.spread)
    }
}

/// A single decided game. Immutable once supplied by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Game {
    pub winner: CompetitorId,
    pub loser: CompetitorId,
}

impl Game {
    pub fn new(winner: impl Into<CompetitorId>, loser: impl Into<CompetitorId>) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
        }
    }

    pub fn involves(&self, competitor: &str) -> bool {
        self.winner == competitor || self.loser == competitor
    }
}

impl<W: Into<CompetitorId>, L: Into<CompetitorId>> From<(W, L)> for Game {
    fn from((winner, loser): (W, L)) -> Self {
        Game::new(winner, loser)
    }
}

/// Every competitor appearing in `games`, in order of first appearance
pub fn competitors(games: &[Game]) -> Vec<CompetitorId> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for game in games {
        for id in [&game.winner, &game.loser] {
            if seen.insert(id.as_str()) {
                ordered.push(id.clone());
            }
        }
    }
    ordered
}

/// Immutable snapshot of a run after some number of iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub ratings: Ratings,
    pub parity: f64,
    pub iteration: usize,
}

impl RunState {
    pub fn initial(ratings: Ratings, parity: f64) -> Self {
        Self {
            ratings,
            parity,
            iteration: 0,
        }
    }
}

/// Largest changes observed between two consecutive snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Deltas {
    /// Largest absolute change of any competitor's mean
    pub rating: f64,
    /// Absolute change of the parity
    pub parity: f64,
}

impl Deltas {
    /// Compare two snapshots. Only competitors in `subset` count when one is given.
    pub fn between(previous: &RunState, next: &RunState, subset: Option<&[CompetitorId]>) -> Self {
        let mean_delta = |id: &CompetitorId| match (previous.ratings.get(id), next.ratings.get(id)) {
            (Some(before), Some(after)) => (after.mean - before.mean).abs(),
            _ => f64::INFINITY,
        };

        let rating = match subset {
            Some(ids) => ids.iter().map(mean_delta).fold(0.0, f64::max),
            None => next.ratings.keys().map(mean_delta).fold(0.0, f64::max),
        };

        Self {
            rating,
            parity: (next.parity - previous.parity).abs(),
        }
    }

    /// The tolerance these deltas actually achieve
    pub fn max(&self) -> f64 {
        self.rating.max(self.parity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belief_rescale() {
        let belief = Belief::new(0.5, 0.25);
        let rescaled = belief.rescale(2.0, -1.0, 0.5);
        assert_eq!(rescaled.mean, 0.0);
        assert_eq!(rescaled.spread, 1.0);
    }

    #[test]
    fn test_competitors_first_appearance_order() {
        let games = vec![
            Game::new("B", "A"),
            Game::new("C", "B"),
            Game::new("A", "D"),
        ];
        assert_eq!(competitors(&games), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_deltas_between_snapshots() {
        let mut before = Ratings::new();
        before.insert("A".to_string(), Belief::new(0.0, 1.0));
        before.insert("B".to_string(), Belief::new(0.0, 1.0));
        let mut after = before.clone();
        after.insert("A".to_string(), Belief::new(0.25, 0.9));
        after.insert("B".to_string(), Belief::new(-0.5, 0.9));

        let previous = RunState::initial(before, 1.0);
        let next = RunState {
            ratings: after,
            parity: 1.5,
            iteration: 1,
        };

        let deltas = Deltas::between(&previous, &next, None);
        assert_eq!(deltas.rating, 0.5);
        assert_eq!(deltas.parity, 0.5);

        let subset = vec!["A".to_string()];
        let deltas = Deltas::between(&previous, &next, Some(&subset));
        assert_eq!(deltas.rating, 0.25);
        assert_eq!(deltas.max(), 0.5);
    }
}

//! Shared builders for integration tests

#![allow(dead_code)]

use parity_ratings::types::{Game, Ratings};
use parity_ratings::{EngineConfig, RatingEngine};

/// Games from `(winner, loser)` pairs
pub fn games(pairs: &[(&str, &str)]) -> Vec<Game> {
    pairs.iter().map(|&(winner, loser)| Game::new(winner, loser)).collect()
}

/// A beats B, C and D; B beats C and D; C beats D
pub fn transitive_four() -> Vec<Game> {
    games(&[
        ("A", "B"),
        ("A", "C"),
        ("A", "D"),
        ("B", "C"),
        ("B", "D"),
        ("C", "D"),
    ])
}

pub fn engine() -> RatingEngine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> RatingEngine {
    match RatingEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => panic!("Test engine configuration rejected: {}", e),
    }
}

pub fn mean(ratings: &Ratings, id: &str) -> f64 {
    ratings[id].mean
}

pub fn spread(ratings: &Ratings, id: &str) -> f64 {
    ratings[id].spread
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {} ± {}, got {}",
        expected,
        tolerance,
        actual
    );
}

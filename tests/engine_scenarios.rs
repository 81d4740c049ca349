//! End-to-end rating runs on small seasons with known fixed points

mod fixtures;

use fixtures::{assert_close, engine, engine_with, games, mean, spread, transitive_four};
use parity_ratings::rating::{
    run_cached, CacheEntry, CacheSource, Diagnostic, InMemoryRatingsCache, JsonFileRatingsCache,
    RatingsCache,
};
use parity_ratings::types::{Belief, Ratings};
use parity_ratings::{EngineConfig, InitialState, RunPhase};

#[test]
fn test_single_game_fixed_point() {
    let season = games(&[("B", "A")]);
    let outcome = engine().run(&season, InitialState::new()).unwrap();

    assert!(outcome.converged());
    assert!(outcome.achieved_tolerance() < 1e-3);
    let ratings = outcome.ratings();
    assert!(mean(ratings, "B") > mean(ratings, "A"));
    assert_close(mean(ratings, "B"), 0.3526, 0.01);
    assert_close(mean(ratings, "A"), -0.3526, 0.01);
    assert_close(spread(ratings, "B"), 0.918, 0.01);
    assert_close(spread(ratings, "A"), 0.918, 0.01);
    assert_close(outcome.parity(), 1.395, 0.05);
}

#[test]
fn test_mirrored_results_push_parity_to_the_bracket_edge() {
    let season = games(&[("A", "B"), ("B", "A")]);
    let outcome = engine().run(&season, InitialState::new()).unwrap();

    assert!(outcome.converged());
    let ratings = outcome.ratings();
    assert_close(mean(ratings, "A"), 0.0, 1e-9);
    assert_close(mean(ratings, "B"), 0.0, 1e-9);
    assert_close(spread(ratings, "A"), 0.9997, 1e-3);
    assert!(outcome.parity() > 49.9);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w.diagnostic, Diagnostic::ParityAtBracketEdge { .. })));
}

#[test]
fn test_transitive_season_orders_competitors() {
    let outcome = engine().run(&transitive_four(), InitialState::new()).unwrap();

    assert!(outcome.converged());
    let ratings = outcome.ratings();
    assert!(mean(ratings, "A") > mean(ratings, "B"));
    assert!(mean(ratings, "B") > mean(ratings, "C"));
    assert!(mean(ratings, "C") > mean(ratings, "D"));
    assert_close(mean(ratings, "A"), 0.932, 0.01);
    assert_close(mean(ratings, "B"), 0.299, 0.01);
    assert_close(mean(ratings, "A"), -mean(ratings, "D"), 1e-6);
    assert_close(outcome.parity(), 0.647, 0.02);
}

#[test]
fn test_iteration_cap_returns_last_state_with_warning() {
    let config = EngineConfig::default()
        .with_convergence(1e-12)
        .with_max_iterations(1);
    let outcome = engine_with(config)
        .run(&games(&[("B", "A")]), InitialState::new())
        .unwrap();

    assert_eq!(outcome.phase, RunPhase::Iterating);
    assert!(!outcome.converged());
    assert_eq!(outcome.iterations(), 1);
    assert!(outcome.achieved_tolerance() > 1e-12);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w.diagnostic, Diagnostic::NotConverged { iterations: 1, .. })));
}

#[test]
fn test_fixed_point_is_stable() {
    let engine = engine();
    let season = transitive_four();
    let outcome = engine.run(&season, InitialState::new()).unwrap();

    let step = engine.step(&season, &outcome.state, None).unwrap();
    assert!(step.deltas.rating < 1e-3);
    assert!(step.deltas.parity < 1e-3);
    assert_eq!(step.state.iteration, outcome.iterations() + 1);
}

#[test]
fn test_subset_run_freezes_everyone_else() {
    let season = transitive_four();
    let mut start = Ratings::new();
    start.insert("B".to_string(), Belief::new(0.3, 0.65));
    start.insert("C".to_string(), Belief::new(-0.3, 0.65));
    start.insert("D".to_string(), Belief::new(-0.93, 0.71));

    let initial = InitialState::new()
        .with_ratings(start.clone())
        .with_parity(0.65)
        .with_subset(vec!["A".to_string()]);
    let outcome = engine().run(&season, initial).unwrap();

    for id in ["B", "C", "D"] {
        assert_eq!(outcome.ratings()[id], start[id]);
    }
    assert!(mean(outcome.ratings(), "A") > 0.5);
}

#[test]
fn test_unknown_subset_member_is_rejected() {
    let initial = InitialState::new().with_subset(vec!["Z".to_string()]);
    let err = engine().run(&transitive_four(), initial).unwrap_err();
    assert!(err.to_string().contains("Unknown competitor: Z"));
}

#[test]
fn test_empty_season_is_rejected() {
    assert!(engine().run(&[], InitialState::new()).is_err());
}

#[test]
fn test_cached_runs() {
    let engine = engine();
    let cache = InMemoryRatingsCache::new();
    let season = games(&[("B", "A")]);

    let cold = run_cached(&engine, &cache, "single", &season, InitialState::new()).unwrap();
    assert_eq!(cold.source, CacheSource::Cold);
    assert_eq!(cache.len(), 1);

    let hit = run_cached(&engine, &cache, "single", &season, InitialState::new()).unwrap();
    assert_eq!(hit.source, CacheSource::Hit);
    assert_eq!(hit.outcome.ratings(), cold.outcome.ratings());
    assert_eq!(hit.outcome.parity(), cold.outcome.parity());

    // A capped run leaves an entry that is not good enough to return
    let capped = engine_with(EngineConfig::default().with_max_iterations(1))
        .run(&season, InitialState::new())
        .unwrap();
    cache.put("capped", CacheEntry::from_outcome(&capped)).unwrap();
    let warm = run_cached(&engine, &cache, "capped", &season, InitialState::new()).unwrap();
    assert_eq!(warm.source, CacheSource::WarmStart);
    assert!(warm.outcome.converged());
    assert!(cache.get("capped").unwrap().unwrap().converged);

    let mut supplied = Ratings::new();
    supplied.insert("A".to_string(), Belief::new(-0.35, 0.92));
    supplied.insert("B".to_string(), Belief::new(0.35, 0.92));
    let calibrated = run_cached(
        &engine,
        &cache,
        "supplied",
        &season,
        InitialState::new().with_ratings(supplied),
    )
    .unwrap();
    assert_eq!(calibrated.source, CacheSource::Calibrated);
    assert_close(calibrated.outcome.parity(), 1.395, 0.05);
}

#[test]
fn test_file_cache_survives_reopening() {
    let path = std::env::temp_dir().join(format!(
        "parity-ratings-scenario-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let engine = engine();
    let season = transitive_four();
    let first = run_cached(
        &engine,
        &JsonFileRatingsCache::new(&path),
        "2023w01fbs",
        &season,
        InitialState::new(),
    )
    .unwrap();
    assert_eq!(first.source, CacheSource::Cold);

    let second = run_cached(
        &engine,
        &JsonFileRatingsCache::new(&path),
        "2023w01fbs",
        &season,
        InitialState::new(),
    )
    .unwrap();
    assert_eq!(second.source, CacheSource::Hit);
    for (id, belief) in first.outcome.ratings() {
        assert_close(mean(second.outcome.ratings(), id), belief.mean, 1e-12);
        assert_close(spread(second.outcome.ratings(), id), belief.spread, 1e-12);
    }

    let _ = std::fs::remove_file(&path);
}

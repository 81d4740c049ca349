//! Season CSV through the feed and into a bridged rating run

mod fixtures;

use fixtures::engine_with;
use parity_ratings::feed::{self, read_records, GameRecord};
use parity_ratings::rating::{bridge_divisions, CacheSource, InMemoryRatingsCache};
use parity_ratings::types::Game;
use parity_ratings::EngineConfig;

const SEASON: &str = "\
week,season_type,start_date,completed,home_id,home_team,home_conference,home_division,home_points,away_id,away_team,away_conference,away_division,away_points
1,regular,2023-09-02T19:30:00.000Z,true,1,Alpha,East,fbs,28,2,Bravo,East,fbs,14
1,regular,2023-09-02T16:00:00.000Z,true,2,Bravo,East,fbs,35,10,Sierra,Valley,fcs,7
2,regular,2023-09-09T16:00:00.000Z,true,10,Sierra,Valley,fcs,21,11,Tango,Valley,fcs,17
2,regular,2023-09-09T18:00:00.000Z,true,11,Tango,Valley,fcs,42,90,Xray,,ii,0
2,regular,2023-09-09T20:00:00.000Z,false,3,Charlie,West,fbs,,1,Alpha,East,fbs,
1,postseason,2024-01-01T17:00:00.000Z,true,1,Alpha,East,fbs,31,3,Charlie,West,fbs,24
";

fn records() -> Vec<GameRecord> {
    read_records(SEASON.as_bytes()).unwrap()
}

#[test]
fn test_division_season_squashes_outsiders() {
    let season = feed::division_season(&records(), "fbs", u32::MAX, true);
    assert_eq!(
        season,
        vec![
            Game::new("Alpha #1", "Bravo #2"),
            Game::new("Bravo #2", "FCS #0"),
            Game::new("Alpha #1", "Charlie #3"),
        ]
    );
}

#[test]
fn test_last_week_drops_postseason() {
    let season = feed::division_season(&records(), "fbs", 2, true);
    assert_eq!(season.len(), 2);
    assert!(season.iter().all(|game| !game.involves("Charlie #3")));

    let opening_week = feed::division_season(&records(), "fcs", 1, true);
    assert_eq!(opening_week, vec![Game::new("FBS #0", "Sierra #10")]);
}

#[test]
fn test_bridge_plan_lists() {
    let plan = feed::bridge_plan(&records(), "fbs", "fcs", 20);

    assert_eq!(plan.primary_node, "FBS #0");
    assert_eq!(plan.secondary_node, "FCS #0");
    assert_eq!(
        plan.secondary_squashed,
        vec![
            Game::new("FBS #0", "Sierra #10"),
            Game::new("Sierra #10", "Tango #11"),
            Game::new("Tango #11", "II #0"),
        ]
    );
    assert!(plan.full.contains(&Game::new("Bravo #2", "Sierra #10")));
    assert!(!plan.full.iter().any(|game| game.involves("FCS #0")));
}

#[test]
fn test_bridged_run_from_csv() {
    let engine = engine_with(EngineConfig::default().with_convergence(1e-2));
    let cache = InMemoryRatingsCache::new();
    let plan = feed::bridge_plan(&records(), "fbs", "fcs", 20);

    let outcome = bridge_divisions(&engine, &cache, "2023w20", &plan).unwrap();

    assert_eq!(cache.len(), 3);
    assert_eq!(outcome.combined.source, CacheSource::Calibrated);
    let ratings = outcome.ratings();
    for id in ["Alpha #1", "Bravo #2", "Charlie #3", "Sierra #10", "Tango #11"] {
        assert!(ratings[id].mean.is_finite(), "{} missing a finite rating", id);
    }
    assert!(!ratings.contains_key("FCS #0"));
    assert!(ratings["Alpha #1"].mean > ratings["Charlie #3"].mean);
}

//! Game feed
//!
//! Turns season CSV records into the ordered `(winner, loser)` list the
//! engine consumes, through a chain of record stages.

pub mod record;
pub mod stages;

// Re-export commonly used types
pub use record::{
    competitor_id, macro_node_id, read_records, read_records_from_path, team_name, GameRecord,
    SeasonType,
};
pub use stages::{
    previous_monday, ConferenceFilter, DivisionFilter, GameFeed, NonConferenceFilter, RecordStage,
    WeekFilter,
};

use crate::rating::{BridgePlan, RerateGroup};
use crate::types::Game;

/// Games of `division` through `last_week`, with outside opponents collapsed
/// into one node when `squash_others` is set
pub fn division_season(
    records: &[GameRecord],
    division: &str,
    last_week: u32,
    squash_others: bool,
) -> Vec<Game> {
    let mut filter = DivisionFilter::new(division);
    if !squash_others {
        filter = filter.unsquashed();
    }
    GameFeed::new()
        .with_stage(WeekFilter::from_records(last_week, records))
        .with_stage(filter)
        .games(records)
}

/// The three game lists for bridging `secondary` onto `primary`
pub fn bridge_plan(
    records: &[GameRecord],
    primary: &str,
    secondary: &str,
    last_week: u32,
) -> BridgePlan {
    BridgePlan {
        primary_squashed: division_season(records, primary, last_week, true),
        secondary_squashed: division_season(records, secondary, last_week, true),
        full: division_season(records, primary, last_week, false),
        primary_node: macro_node_id(primary),
        secondary_node: macro_node_id(secondary),
        primary_label: primary.to_lowercase(),
        secondary_label: secondary.to_lowercase(),
        rerate: RerateGroup::Primary,
    }
}

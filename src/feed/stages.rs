//! Record stages
//!
//! Each stage approves, rejects or relabels one record at a time. A
//! `GameFeed` runs records through its stages in order and turns the
//! survivors into games.

use crate::feed::record::GameRecord;
use crate::types::Game;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use tracing::debug;

/// One step of the record pipeline
pub trait RecordStage: Send + Sync + std::fmt::Debug {
    /// The (possibly relabelled) record, or `None` to drop it
    fn apply(&self, record: GameRecord) -> Option<GameRecord>;
}

/// Keep games involving one division.
///
/// Games against outside opponents are kept when `include_others` is set,
/// with the outside side collapsed into a single node when `squash_others`
/// is set as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionFilter {
    pub division: String,
    pub include_others: bool,
    pub squash_others: bool,
}

impl DivisionFilter {
    pub fn new(division: impl Into<String>) -> Self {
        Self {
            division: division.into(),
            include_others: true,
            squash_others: true,
        }
    }

    /// Keep outside opponents as themselves
    pub fn unsquashed(mut self) -> Self {
        self.squash_others = false;
        self
    }

    /// Drop every game against an outside opponent
    pub fn exclusive(mut self) -> Self {
        self.include_others = false;
        self
    }
}

impl RecordStage for DivisionFilter {
    fn apply(&self, mut record: GameRecord) -> Option<GameRecord> {
        if record.home_division != self.division {
            if record.away_division != self.division || !self.include_others {
                return None;
            }
            if self.squash_others {
                let division = record.home_division.clone();
                record.squash_home(&division);
            }
            record.home_conference = record.home_division.to_uppercase();
        } else if record.away_division != self.division {
            if !self.include_others {
                return None;
            }
            if self.squash_others {
                let division = record.away_division.clone();
                record.squash_away(&division);
            }
            record.away_conference = record.away_division.to_uppercase();
        }
        Some(record)
    }
}

/// Keep games involving one conference; outside opponents are dropped
/// unless `include_others` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceFilter {
    pub conference: String,
    pub include_others: bool,
    pub squash_others: bool,
}

impl ConferenceFilter {
    pub fn new(conference: impl Into<String>) -> Self {
        Self {
            conference: conference.into(),
            include_others: false,
            squash_others: false,
        }
    }

    pub fn with_others(mut self, squash_others: bool) -> Self {
        self.include_others = true;
        self.squash_others = squash_others;
        self
    }
}

impl RecordStage for ConferenceFilter {
    fn apply(&self, mut record: GameRecord) -> Option<GameRecord> {
        if record.home_conference != self.conference {
            if record.away_conference != self.conference || !self.include_others {
                return None;
            }
            if self.squash_others {
                let conference = record.home_conference.clone();
                record.squash_home(&conference);
            }
            record.home_division = record.home_conference.to_uppercase();
        } else if record.away_conference != self.conference {
            if !self.include_others {
                return None;
            }
            if self.squash_others {
                let conference = record.away_conference.clone();
                record.squash_away(&conference);
            }
            record.away_division = record.away_conference.to_uppercase();
        }
        Some(record)
    }
}

/// Drop games between members of the same conference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonConferenceFilter;

impl RecordStage for NonConferenceFilter {
    fn apply(&self, record: GameRecord) -> Option<GameRecord> {
        if record.home_conference == record.away_conference {
            None
        } else {
            Some(record)
        }
    }
}

/// Keep games played up to and including `last_week`.
///
/// Postseason games carry no week of their own; they are placed after the
/// last regular-season week, counting weeks from the Monday before the first
/// postseason game.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekFilter {
    pub last_week: f64,
    pub regular_season_end_week: f64,
    pub postseason_start: Option<DateTime<Utc>>,
}

impl WeekFilter {
    /// Derive the regular-season boundary from a whole season's records
    pub fn from_records(last_week: u32, records: &[GameRecord]) -> Self {
        let regular_season_end_week = records
            .iter()
            .filter(|record| !record.is_postseason())
            .map(|record| record.week)
            .fold(0.0, f64::max);
        let postseason_start = records
            .iter()
            .filter(|record| record.is_postseason())
            .map(|record| record.start_date)
            .min()
            .map(previous_monday);

        Self {
            last_week: f64::from(last_week),
            regular_season_end_week,
            postseason_start,
        }
    }

    fn effective_week(&self, record: &GameRecord) -> f64 {
        match (record.is_postseason(), self.postseason_start) {
            (true, Some(start)) => {
                let elapsed = record.start_date - start;
                elapsed.num_seconds() as f64 / Duration::weeks(1).num_seconds() as f64
                    + self.regular_season_end_week
            }
            _ => record.week,
        }
    }
}

impl RecordStage for WeekFilter {
    fn apply(&self, mut record: GameRecord) -> Option<GameRecord> {
        record.week = self.effective_week(&record);
        if record.week > self.last_week {
            None
        } else {
            Some(record)
        }
    }
}

/// 05:00 UTC on the Monday of the (US Eastern) week containing `instant`
pub fn previous_monday(instant: DateTime<Utc>) -> DateTime<Utc> {
    let shifted = instant - Duration::hours(5);
    let days_since_monday = i64::from(shifted.weekday().num_days_from_monday());
    let monday = shifted.date_naive() - Duration::days(days_since_monday);
    let five_am = NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default();
    monday.and_time(five_am).and_utc()
}

/// An ordered chain of record stages
#[derive(Debug, Default)]
pub struct GameFeed {
    stages: Vec<Box<dyn RecordStage>>,
}

impl GameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage<S: RecordStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run one record through every stage
    pub fn process(&self, record: GameRecord) -> Option<GameRecord> {
        self.stages
            .iter()
            .try_fold(record, |record, stage| stage.apply(record))
    }

    /// Completed games surviving every stage, in record order
    pub fn games<'a, I>(&self, records: I) -> Vec<Game>
    where
        I: IntoIterator<Item = &'a GameRecord>,
    {
        let mut total = 0;
        let games: Vec<Game> = records
            .into_iter()
            .inspect(|_| total += 1)
            .filter_map(|record| self.process(record.clone()))
            .filter_map(|record| record.outcome())
            .map(|(winner, loser)| Game::new(winner, loser))
            .collect();
        debug!("Game feed kept {} of {} records", games.len(), total);
        games
    }
}

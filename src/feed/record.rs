//! Season CSV records

use crate::error::{RatingError, Result};
use crate::types::CompetitorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;
use std::path::Path;

/// Regular season or postseason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    Regular,
    Postseason,
}

/// One row of a season schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Week number; postseason games may be relabelled to fractional weeks
    pub week: f64,
    pub season_type: SeasonType,
    pub start_date: DateTime<Utc>,
    #[serde(deserialize_with = "lenient_bool")]
    pub completed: bool,
    pub home_id: String,
    pub home_team: String,
    #[serde(default)]
    pub home_conference: String,
    #[serde(default)]
    pub home_division: String,
    pub home_points: Option<u32>,
    pub away_id: String,
    pub away_team: String,
    #[serde(default)]
    pub away_conference: String,
    #[serde(default)]
    pub away_division: String,
    pub away_points: Option<u32>,
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

/// `"{team} #{id}"`
pub fn competitor_id(team: &str, id: &str) -> CompetitorId {
    format!("{} #{}", team, id)
}

/// Id of the node standing in for a whole collapsed division or conference
pub fn macro_node_id(group: &str) -> CompetitorId {
    competitor_id(&group.to_uppercase(), "0")
}

/// Team name part of a competitor id
pub fn team_name(competitor: &str) -> &str {
    match competitor.rfind(" #") {
        Some(index) => &competitor[..index],
        None => competitor,
    }
}

impl GameRecord {
    pub fn home(&self) -> CompetitorId {
        competitor_id(&self.home_team, &self.home_id)
    }

    pub fn away(&self) -> CompetitorId {
        competitor_id(&self.away_team, &self.away_id)
    }

    pub fn is_postseason(&self) -> bool {
        self.season_type == SeasonType::Postseason
    }

    /// Replace the home side with the node for `group`
    pub fn squash_home(&mut self, group: &str) {
        self.home_team = group.to_uppercase();
        self.home_id = "0".to_string();
    }

    /// Replace the away side with the node for `group`
    pub fn squash_away(&mut self, group: &str) {
        self.away_team = group.to_uppercase();
        self.away_id = "0".to_string();
    }

    /// `(winner, loser)` of a completed game; the away side takes ties
    pub fn outcome(&self) -> Option<(CompetitorId, CompetitorId)> {
        if !self.completed {
            return None;
        }
        let (home_points, away_points) = (self.home_points?, self.away_points?);
        if home_points > away_points {
            Some((self.home(), self.away()))
        } else {
            Some((self.away(), self.home()))
        }
    }
}

/// Read every record of a season CSV (with header row)
pub fn read_records<R: Read>(reader: R) -> Result<Vec<GameRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, record) in reader.deserialize().enumerate() {
        let record: GameRecord = record.map_err(|e| RatingError::FeedError {
            message: format!("Malformed record {}: {}", line + 1, e),
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<GameRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| RatingError::FeedError {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    read_records(std::io::BufReader::new(file))
}

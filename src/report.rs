//! Conference report
//!
//! Averages the bridged ratings over conference membership for a season.
//! Membership comes from a TOML table of half-open year ranges:
//!
//! ```toml
//! last_season = 2024
//!
//! [conferences."Big Ten"]
//! "Ohio State" = [[1912, 2025]]
//! "Colorado" = [[1996, 2012], [2024, 2025]]
//! ```

use crate::error::{RatingError, Result};
use crate::feed::team_name;
use crate::types::Ratings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Conferences with fewer members do not meet the divisional minimum
pub const MINIMUM_MEMBERS: usize = 8;

/// Conference name → team name → membership year ranges `[from, to)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConferenceTable {
    /// Latest season the table is known to be correct for; later years are
    /// reported with this season's membership
    #[serde(default)]
    pub last_season: Option<i32>,
    pub conferences: BTreeMap<String, BTreeMap<String, Vec<[i32; 2]>>>,
}

impl ConferenceTable {
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| {
            RatingError::ConfigurationError {
                message: format!("Invalid conference table: {}", e),
            }
            .into()
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| RatingError::ConfigurationError {
            message: format!("Failed to read conference table {}: {}", path.display(), e),
        })?;
        Self::from_toml(&contents)
    }

    fn effective_year(&self, year: i32) -> i32 {
        match self.last_season {
            Some(last) => year.min(last),
            None => year,
        }
    }

    /// Members of `conference` in `year`, in name order
    pub fn members(&self, conference: &str, year: i32) -> Vec<&str> {
        let year = self.effective_year(year);
        self.conferences
            .get(conference)
            .map(|teams| {
                teams
                    .iter()
                    .filter(|(_, spans)| spans.iter().any(|[from, to]| (*from..*to).contains(&year)))
                    .map(|(team, _)| team.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Average rating of one conference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConferenceAverage {
    pub conference: String,
    pub average: f64,
    pub members: usize,
    /// Members that actually appear in the ratings
    pub rated_members: usize,
    /// Below the divisional membership minimum
    pub unofficial: bool,
}

/// Mean rating of every conference with at least one rated member in
/// `year`, strongest first
pub fn conference_averages(
    ratings: &Ratings,
    table: &ConferenceTable,
    year: i32,
) -> Vec<ConferenceAverage> {
    let team_means: HashMap<&str, f64> = ratings
        .iter()
        .map(|(id, belief)| (team_name(id), belief.mean))
        .collect();

    let mut averages: Vec<ConferenceAverage> = table
        .conferences
        .keys()
        .filter_map(|conference| {
            let members = table.members(conference, year);
            let means: Vec<f64> = members
                .iter()
                .filter_map(|team| team_means.get(team).copied())
                .collect();
            if means.is_empty() {
                return None;
            }
            Some(ConferenceAverage {
                conference: conference.clone(),
                average: means.iter().sum::<f64>() / means.len() as f64,
                members: members.len(),
                rated_members: means.len(),
                unofficial: members.len() < MINIMUM_MEMBERS,
            })
        })
        .collect();

    averages.sort_by(|a, b| b.average.total_cmp(&a.average));
    averages
}

//! Utility functions for the rating tool

use crate::types::{Belief, CompetitorId, Ratings};
use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Cache tag of a season snapshot, e.g. `2023w05fbs`
pub fn run_tag(year: i32, week: u32, suffix: &str) -> String {
    format!("{}w{:02}{}", year, week, suffix)
}

/// Ratings ordered strongest first; ties are broken by id
pub fn sorted_by_mean(ratings: &Ratings) -> Vec<(&CompetitorId, &Belief)> {
    let mut sorted: Vec<_> = ratings.iter().collect();
    sorted.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean).then_with(|| a.0.cmp(b.0)));
    sorted
}

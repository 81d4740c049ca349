//! Division bridging
//!
//! Two divisions that rarely meet are rated separately, each with the other
//! collapsed into a single node, then put on a common scale through those
//! nodes and finished with a joint pass over the primary division's full
//! schedule.

use crate::error::{RatingError, Result};
use crate::rating::engine::{InitialState, RatingEngine};
use crate::rating::storage::{run_cached, CachedRun, RatingsCache};
use crate::types::{competitors, Belief, CompetitorId, Game, Ratings};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which competitors the final joint pass re-rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerateGroup {
    /// Everyone except the rescaled secondary division, which is held fixed
    #[default]
    Primary,
    /// Only the rescaled secondary division
    Secondary,
    /// Every competitor of the full season
    All,
}

/// Game lists and node names for a bridged run
#[derive(Debug, Clone)]
pub struct BridgePlan {
    /// Primary division with outside opponents collapsed into `secondary_node`
    pub primary_squashed: Vec<Game>,
    /// Secondary division with outside opponents collapsed into `primary_node`
    pub secondary_squashed: Vec<Game>,
    /// Primary division with outside opponents kept individually
    pub full: Vec<Game>,
    pub primary_node: CompetitorId,
    pub secondary_node: CompetitorId,
    /// Tag suffix stem for the primary division, e.g. `fbs`
    pub primary_label: String,
    /// Tag suffix stem for the secondary division, e.g. `fcs`
    pub secondary_label: String,
    pub rerate: RerateGroup,
}

#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    /// Belief of the secondary node on the primary scale
    pub reference: Belief,
    pub primary: CachedRun,
    pub secondary: CachedRun,
    pub combined: CachedRun,
}

impl BridgeOutcome {
    pub fn ratings(&self) -> &Ratings {
        self.combined.outcome.ratings()
    }
}

fn take_node(ratings: &mut Ratings, node: &CompetitorId) -> Result<Belief> {
    ratings.remove(node).ok_or_else(|| {
        RatingError::UnknownCompetitor {
            competitor: node.clone(),
        }
        .into()
    })
}

/// Run the three bridging phases under tags `{tag}{primary}q`,
/// `{tag}{secondary}q` and `{tag}{primary}`.
pub fn bridge_divisions(
    engine: &RatingEngine,
    cache: &dyn RatingsCache,
    tag: &str,
    plan: &BridgePlan,
) -> Result<BridgeOutcome> {
    let primary = run_cached(
        engine,
        cache,
        &format!("{}{}q", tag, plan.primary_label),
        &plan.primary_squashed,
        InitialState::new(),
    )?;
    let mut primary_ratings = primary.outcome.ratings().clone();
    let reference = take_node(&mut primary_ratings, &plan.secondary_node)?;

    let secondary = run_cached(
        engine,
        cache,
        &format!("{}{}q", tag, plan.secondary_label),
        &plan.secondary_squashed,
        InitialState::new(),
    )?;
    let mut secondary_ratings = secondary.outcome.ratings().clone();
    take_node(&mut secondary_ratings, &plan.primary_node)?;

    let rescaled: Ratings = secondary_ratings
        .into_iter()
        .map(|(id, belief)| {
            (
                id,
                belief.rescale(reference.spread, reference.mean, reference.spread),
            )
        })
        .collect();

    info!(
        "Bridging {} competitors onto the {} scale through {} ({})",
        rescaled.len(),
        plan.primary_label,
        plan.secondary_node,
        reference
    );

    let subset: Option<Vec<CompetitorId>> = match plan.rerate {
        RerateGroup::Primary => Some(
            competitors(&plan.full)
                .into_iter()
                .filter(|id| !rescaled.contains_key(id))
                .collect(),
        ),
        RerateGroup::Secondary => {
            let mut ids: Vec<CompetitorId> = rescaled.keys().cloned().collect();
            ids.sort();
            Some(ids)
        }
        RerateGroup::All => None,
    };

    let mut merged = primary_ratings;
    for (id, belief) in rescaled {
        merged.entry(id).or_insert(belief);
    }

    let mut initial = InitialState::new().with_ratings(merged);
    if let Some(subset) = subset {
        initial = initial.with_subset(subset);
    }

    let combined = run_cached(
        engine,
        cache,
        &format!("{}{}", tag, plan.primary_label),
        &plan.full,
        initial,
    )?;

    Ok(BridgeOutcome {
        reference,
        primary,
        secondary,
        combined,
    })
}

//! Ratings cache interface and implementations
//!
//! Finished runs are stored under an opaque run tag such as `2023w17fbs`.
//! The engine never touches the cache itself; `run_cached` decides between
//! reusing, warm-starting from, or ignoring a stored entry, and makes sure a
//! failing cache never costs the freshly computed ratings.

use crate::error::{RatingError, Result};
use crate::rating::diagnostics::IntegrationErrors;
use crate::rating::engine::{InitialState, RatingEngine, RunOutcome, RunPhase};
use crate::types::{Deltas, Game, Ratings, RunState};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default cache file name
pub const DEFAULT_CACHE_FILE: &str = "RatingsCache.json";

/// A finished run as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub achieved_tolerance: f64,
    pub deltas: Deltas,
    pub parity: f64,
    pub ratings: Ratings,
    pub iterations: usize,
    pub converged: bool,
    #[serde(default)]
    pub integration_errors: IntegrationErrors,
    pub computed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            achieved_tolerance: outcome.achieved_tolerance(),
            deltas: outcome.deltas,
            parity: outcome.parity(),
            ratings: outcome.ratings().clone(),
            iterations: outcome.iterations(),
            converged: outcome.converged(),
            integration_errors: outcome.integration_errors,
            computed_at: current_timestamp(),
        }
    }

    /// Whether this entry is already as tight as `tolerance` asks for
    pub fn satisfies(&self, tolerance: f64) -> bool {
        self.converged && self.achieved_tolerance <= tolerance
    }

    /// Rebuild the outcome this entry was stored from
    pub fn to_outcome(&self) -> RunOutcome {
        RunOutcome {
            state: RunState {
                ratings: self.ratings.clone(),
                parity: self.parity,
                iteration: self.iterations,
            },
            phase: if self.converged {
                RunPhase::Converged
            } else {
                RunPhase::Iterating
            },
            deltas: self.deltas,
            integration_errors: self.integration_errors,
            warnings: Vec::new(),
        }
    }
}

/// Trait for ratings cache operations
pub trait RatingsCache: Send + Sync {
    /// Get the entry stored under `tag`
    fn get(&self, tag: &str) -> Result<Option<CacheEntry>>;

    /// Store or replace the entry under `tag`
    fn put(&self, tag: &str, entry: CacheEntry) -> Result<()>;
}

/// In-memory ratings cache
#[derive(Debug, Default)]
pub struct InMemoryRatingsCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryRatingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RatingsCache for InMemoryRatingsCache {
    fn get(&self, tag: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| RatingError::CacheError {
            message: "Failed to acquire cache read lock".to_string(),
        })?;
        Ok(entries.get(tag).cloned())
    }

    fn put(&self, tag: &str, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| RatingError::CacheError {
            message: "Failed to acquire cache write lock".to_string(),
        })?;
        entries.insert(tag.to_string(), entry);
        Ok(())
    }
}

/// Cache kept as a single JSON object keyed by run tag
#[derive(Debug)]
pub struct JsonFileRatingsCache {
    path: PathBuf,
    // Serialises read-modify-write cycles from this process
    lock: Mutex<()>,
}

impl JsonFileRatingsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents, `None` when there is nothing stored yet
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RatingError::CacheError {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }
            .into()),
        }
    }

    fn parse(&self, contents: &str) -> Result<HashMap<String, CacheEntry>> {
        serde_json::from_str(contents).map_err(|e| {
            RatingError::CacheError {
                message: format!("Corrupt cache file {}: {}", self.path.display(), e),
            }
            .into()
        })
    }

    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        match self.read()? {
            Some(contents) => self.parse(&contents),
            None => Ok(HashMap::new()),
        }
    }
}

impl Default for JsonFileRatingsCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_FILE)
    }
}

impl RatingsCache for JsonFileRatingsCache {
    fn get(&self, tag: &str) -> Result<Option<CacheEntry>> {
        let _guard = self.lock.lock().map_err(|_| RatingError::CacheError {
            message: "Failed to acquire cache file lock".to_string(),
        })?;
        Ok(self.load()?.remove(tag))
    }

    fn put(&self, tag: &str, entry: CacheEntry) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| RatingError::CacheError {
            message: "Failed to acquire cache file lock".to_string(),
        })?;
        // Corrupt contents are replaced
        let mut entries = match self.read()? {
            Some(contents) => self.parse(&contents).unwrap_or_else(|e| {
                warn!("Discarding unreadable cache contents: {}", e);
                HashMap::new()
            }),
            None => HashMap::new(),
        };
        entries.insert(tag.to_string(), entry);

        let json = serde_json::to_string(&entries).map_err(|e| RatingError::CacheError {
            message: format!("Failed to serialise cache: {}", e),
        })?;
        std::fs::write(&self.path, json).map_err(|e| RatingError::CacheError {
            message: format!("Failed to write {}: {}", self.path.display(), e),
        })?;

        debug!("Stored '{}' in {}", tag, self.path.display());
        Ok(())
    }
}

/// Cache that never stores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRatingsCache;

impl RatingsCache for NoOpRatingsCache {
    fn get(&self, _tag: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    fn put(&self, _tag: &str, _entry: CacheEntry) -> Result<()> {
        Ok(())
    }
}

/// How a cached run obtained its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheSource {
    /// Returned straight from the cache
    Hit,
    /// Iterated from a looser cached entry
    WarmStart,
    /// Parity calibrated against caller ratings before iterating
    Calibrated,
    /// Iterated from the caller's initial state or the prior
    Cold,
}

#[derive(Debug, Clone)]
pub struct CachedRun {
    pub outcome: RunOutcome,
    pub source: CacheSource,
}

/// Run the engine under `tag`, consulting and updating `cache`.
///
/// Caller ratings without a parity get a parity calibrated against them
/// first. Otherwise, with no caller parity, a cached entry at least as tight
/// as the configured tolerance is returned as-is and a looser one is used
/// as the starting point.
pub fn run_cached(
    engine: &RatingEngine,
    cache: &dyn RatingsCache,
    tag: &str,
    games: &[Game],
    mut initial: InitialState,
) -> Result<CachedRun> {
    let tolerance = engine.config().convergence;

    let source = match (initial.ratings.is_some(), initial.parity.is_some()) {
        (true, false) => {
            let state = engine.initialize(games, &initial)?;
            let calibration = engine.calibrate_parity(games, &state.ratings)?;
            debug!(
                "Calibrated starting parity {:.6} for '{}' from supplied ratings",
                calibration.parity, tag
            );
            initial.ratings = Some(state.ratings);
            initial.parity = Some(calibration.parity);
            CacheSource::Calibrated
        }
        (false, false) => match lookup(cache, tag) {
            Some(entry) if entry.satisfies(tolerance) => {
                info!(
                    "Cache hit for '{}' (achieved tolerance {:e})",
                    tag, entry.achieved_tolerance
                );
                return Ok(CachedRun {
                    outcome: entry.to_outcome(),
                    source: CacheSource::Hit,
                });
            }
            Some(entry) => {
                info!(
                    "Warm-starting '{}' from cached entry (achieved tolerance {:e})",
                    tag, entry.achieved_tolerance
                );
                initial.ratings = Some(entry.ratings);
                initial.parity = Some(entry.parity);
                CacheSource::WarmStart
            }
            None => CacheSource::Cold,
        },
        _ => CacheSource::Cold,
    };

    let outcome = engine.run(games, initial)?;

    if let Err(e) = cache.put(tag, CacheEntry::from_outcome(&outcome)) {
        warn!("Failed to store ratings for '{}' in cache: {}", tag, e);
    }

    Ok(CachedRun { outcome, source })
}

fn lookup(cache: &dyn RatingsCache, tag: &str) -> Option<CacheEntry> {
    match cache.get(tag) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Ignoring unreadable cache entry '{}': {}", tag, e);
            None
        }
    }
}

//! # Beer Recommender
//!
//! Joins the model's answers with catalog metadata:
//! 1. Neighbour lookup: beers most similar to a given beer
//! 2. Single prediction: estimated rating for one (user, beer) pair
//! 3. Batch ranking: score the whole catalog for a user, keep the best
//!    and worst ten
//!
//! The catalog and the model are shared read-only by every request. Batch
//! ranking fans predictions out over a dedicated rayon pool so a single
//! request never occupies more than `workers` threads, and the whole batch
//! runs under a deadline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use beer_catalog::{BeerId, BeerRecord, Catalog};
use knn_model::{Prediction, PredictionDetails, PredictionOracle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{RecommendError, Result};

/// Number of similar beers returned by a neighbour lookup
pub const NEIGHBOR_COUNT: usize = 10;

/// Size of each bucket in a user ranking
pub const PICK_COUNT: usize = 10;

/// Round to two decimals, ties to even (numpy's `round`)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// One row of a neighbour report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborRecord {
    pub beer_id: BeerId,
    pub name: String,
    pub style: String,
    pub score_mean: f64,
}

/// A beer reference as sent by clients: the numeric id or the display name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BeerRef {
    Id(BeerId),
    Name(String),
}

/// A single prediction in the shape clients consume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub username: String,
    pub beer_id: BeerId,
    pub r_ui: Option<f64>,
    pub prediction: f64,
    pub details: PredictionDetails,
}

impl From<Prediction> for PredictionResult {
    fn from(p: Prediction) -> Self {
        Self {
            username: p.uid,
            beer_id: p.iid,
            r_ui: p.r_ui,
            prediction: p.est,
            details: p.details,
        }
    }
}

/// Which end of a user ranking a pick came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PickBucket {
    Top10,
    Bottom10,
}

/// A prediction joined with catalog metadata and tagged with its bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPick {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub beer_brewery: String,
    pub style: String,
    pub score: f64,
    pub pick: PickBucket,
}

/// Prediction joined with metadata, before bucketing. Scores already rounded.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBeer {
    pub result: PredictionResult,
    pub beer_brewery: String,
    pub style: String,
    pub score: f64,
}

impl ScoredBeer {
    pub fn join(prediction: Prediction, beer: &BeerRecord) -> Self {
        let mut result = PredictionResult::from(prediction);
        result.prediction = round2(result.prediction);
        Self {
            result,
            beer_brewery: beer.display_name.clone(),
            style: beer.style.clone(),
            score: round2(beer.mean_score),
        }
    }

    fn into_pick(self, pick: PickBucket) -> RankedPick {
        RankedPick {
            result: self.result,
            beer_brewery: self.beer_brewery,
            style: self.style,
            score: self.score,
            pick,
        }
    }
}

/// The best and worst predicted beers for one user
#[derive(Debug, Clone, PartialEq)]
pub struct UserRanking {
    pub top: Vec<RankedPick>,
    pub bottom: Vec<RankedPick>,
}

impl UserRanking {
    /// Top picks followed by bottom picks, the order clients render
    pub fn into_combined(self) -> Vec<RankedPick> {
        let mut picks = self.top;
        picks.extend(self.bottom);
        picks
    }
}

/// Sort scored beers by prediction (descending, stable) and slice both ends.
///
/// The bottom bucket is the tail of the descending order, so it reads from
/// the highest of the lowest scores down. With fewer than twenty beers the
/// two buckets overlap. NaN predictions rank below every number.
pub fn select_picks(mut scored: Vec<ScoredBeer>) -> UserRanking {
    scored.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));

    let top = scored
        .iter()
        .take(PICK_COUNT)
        .cloned()
        .map(|s| s.into_pick(PickBucket::Top10))
        .collect();
    let tail_start = scored.len().saturating_sub(PICK_COUNT);
    let bottom = scored
        .drain(tail_start..)
        .map(|s| s.into_pick(PickBucket::Bottom10))
        .collect();

    UserRanking { top, bottom }
}

fn sort_key(beer: &ScoredBeer) -> f64 {
    let prediction = beer.result.prediction;
    if prediction.is_nan() {
        f64::NEG_INFINITY
    } else {
        // -0.0 and 0.0 must tie
        prediction + 0.0
    }
}

/// Limits for batch ranking
#[derive(Debug, Clone, Copy)]
pub struct RankerConfig {
    /// Threads scoring one request's catalog
    pub workers: usize,
    /// Budget for scoring the whole catalog
    pub deadline: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            deadline: Duration::from_secs(30),
        }
    }
}

/// Serves neighbour lookups, predictions and rankings
#[derive(Clone)]
pub struct BeerRecommender {
    catalog: Arc<Catalog>,
    oracle: Arc<dyn PredictionOracle>,
    pool: Arc<rayon::ThreadPool>,
    deadline: Duration,
}

impl BeerRecommender {
    /// Create a recommender over a loaded catalog and model
    pub fn new(
        catalog: Arc<Catalog>,
        oracle: Arc<dyn PredictionOracle>,
        config: RankerConfig,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("ranker-{}", i))
            .build()
            .map_err(|e| RecommendError::Internal(format!("building ranker pool: {}", e)))?;

        Ok(Self {
            catalog,
            oracle,
            pool: Arc::new(pool),
            deadline: config.deadline,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn oracle(&self) -> &dyn PredictionOracle {
        self.oracle.as_ref()
    }

    /// Display names for the beer dropdown
    pub fn list_display_names(&self) -> Vec<String> {
        self.catalog.list_display_names()
    }

    /// Resolve a client beer reference to a catalog id
    pub fn resolve(&self, beer: &BeerRef) -> Result<BeerId> {
        match beer {
            BeerRef::Id(id) => Ok(self.catalog.lookup_by_id(*id)?.id),
            BeerRef::Name(name) => Ok(self.catalog.lookup_id_by_name(name)?),
        }
    }

    // =========================================================================
    // Neighbour lookup
    // =========================================================================

    /// The `k` beers the model considers most similar to `beer_id`
    pub fn neighbors(&self, beer_id: BeerId, k: usize) -> Result<Vec<BeerId>> {
        let inner = self.oracle.to_inner_iid(beer_id)?;
        let neighbors = self.oracle.neighbors_of(inner, k)?;
        neighbors
            .into_iter()
            .map(|n| self.oracle.to_raw_iid(n).map_err(RecommendError::from))
            .collect()
    }

    /// Neighbours of `beer_id` joined with catalog metadata, in similarity order
    pub fn neighbor_report(&self, beer_id: BeerId) -> Result<Vec<NeighborRecord>> {
        let neighbors = self.neighbors(beer_id, NEIGHBOR_COUNT)?;
        debug!("Beer {} has {} neighbours", beer_id, neighbors.len());

        neighbors
            .into_iter()
            .map(|id| {
                let beer = self.catalog.get(id).ok_or_else(|| {
                    RecommendError::Inconsistent(format!(
                        "neighbour {} of beer {} is missing from the catalog",
                        id, beer_id
                    ))
                })?;
                Ok(NeighborRecord {
                    beer_id: beer.id,
                    name: beer.display_name.clone(),
                    style: beer.style.clone(),
                    score_mean: round2(beer.mean_score),
                })
            })
            .collect()
    }

    pub fn neighbor_report_by_name(&self, display_name: &str) -> Result<Vec<NeighborRecord>> {
        let beer_id = self.catalog.lookup_id_by_name(display_name)?;
        self.neighbor_report(beer_id)
    }

    // =========================================================================
    // Predictions
    // =========================================================================

    /// Predict how `user_id` would rate one beer
    pub fn predict_one(&self, user_id: &str, beer: &BeerRef) -> Result<PredictionResult> {
        let beer_id = self.resolve(beer)?;
        Ok(self.oracle.predict(user_id, beer_id)?.into())
    }

    /// Score every beer in the catalog for `user_id` and keep both ends.
    ///
    /// Fails as a whole if any single prediction fails or the deadline passes.
    #[instrument(skip(self))]
    pub async fn rank_for_user(&self, user_id: &str) -> Result<UserRanking> {
        let start = Instant::now();
        let cancelled = Arc::new(AtomicBool::new(false));

        let task = tokio::task::spawn_blocking({
            let this = self.clone();
            let user_id = user_id.to_string();
            let cancelled = cancelled.clone();
            move || this.score_catalog(&user_id, &cancelled)
        });

        let scored = match tokio::time::timeout(self.deadline, task).await {
            Ok(joined) => joined
                .map_err(|e| RecommendError::Internal(format!("ranking task failed: {}", e)))??,
            Err(_) => {
                // Workers check the flag before each prediction and stop early
                cancelled.store(true, Ordering::Relaxed);
                warn!(
                    "Ranking for user '{}' exceeded {:?}, cancelling",
                    user_id, self.deadline
                );
                return Err(RecommendError::DeadlineExceeded(self.deadline));
            }
        };

        let scored_count = scored.len();
        let ranking = select_picks(scored);
        info!(
            "Ranked {} beers for user '{}' in {:.2?} (top={}, bottom={})",
            scored_count,
            user_id,
            start.elapsed(),
            ranking.top.len(),
            ranking.bottom.len()
        );
        Ok(ranking)
    }

    /// Blocking half of `rank_for_user`: one prediction per catalog entry.
    ///
    /// Output keeps catalog order so the later stable sort breaks ties by it.
    fn score_catalog(&self, user_id: &str, cancelled: &AtomicBool) -> Result<Vec<ScoredBeer>> {
        self.pool.install(|| {
            self.catalog
                .records()
                .par_iter()
                .map(|beer| {
                    if cancelled.load(Ordering::Relaxed) {
                        return Err(RecommendError::DeadlineExceeded(self.deadline));
                    }
                    let prediction = self.oracle.predict(user_id, beer.id)?;
                    Ok(ScoredBeer::join(prediction, beer))
                })
                .collect()
        })
    }
}

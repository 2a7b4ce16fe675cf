//! Item-based k-nearest-neighbours collaborative filtering.
//!
//! ## Algorithm
//! To estimate how user `u` would rate item `i`:
//! 1. Take every item `j` that `u` rated, paired with `sim(i, j)`
//! 2. Keep the `k` most similar (ties keep the user's rating order)
//! 3. Combine the ratings of neighbours with positive similarity:
//!    - `Basic`: `sum(sim * r) / sum(sim)`
//!    - `WithMeans`: `mean(i) + sum(sim * (r - mean(j))) / sum(sim)`
//! 4. Clip to the rating scale
//!
//! Unknown users/items, or too few contributing neighbours, fall back to the
//! trainset's global mean and mark the prediction as impossible.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::artifact::{KnnVariant, ModelArtifact};
use crate::error::{ModelLoadError, OracleError, Result};
use crate::oracle::{InnerId, ItemId, Prediction, PredictionDetails, PredictionOracle};

/// Reasons an estimate could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Impossible {
    UnknownEntity,
    NotEnoughNeighbors,
    NonFiniteEstimate,
}

impl fmt::Display for Impossible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impossible::UnknownEntity => write!(f, "User and/or item is unknown."),
            Impossible::NotEnoughNeighbors => write!(f, "Not enough neighbors."),
            Impossible::NonFiniteEstimate => write!(f, "Estimate is not a finite number."),
        }
    }
}

/// A fitted item-based k-NN model, read-only once built.
#[derive(Debug)]
pub struct KnnModel {
    variant: KnnVariant,
    k: usize,
    min_k: usize,
    rating_scale: (f64, f64),
    global_mean: f64,

    raw_users: Vec<String>,
    raw_items: Vec<ItemId>,
    user_index: HashMap<String, InnerId>,
    item_index: HashMap<ItemId, InnerId>,

    /// Ratings given by each user, as `(inner_iid, rating)` in trainset order
    user_ratings: Vec<Vec<(InnerId, f64)>>,
    item_means: Vec<f64>,
    /// Row-major `n_items * n_items` similarity matrix
    similarities: Vec<f64>,
}

impl KnnModel {
    /// Load a model artifact from a JSON file
    pub fn load_from_file(path: &Path) -> std::result::Result<Self, ModelLoadError> {
        info!("Loading k-NN model from {:?}", path);
        let start = Instant::now();

        let file = File::open(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        let model = Self::from_artifact(artifact)?;

        info!(
            "Loaded {:?} model: {} users, {} items, k={} in {:.2?}",
            model.variant,
            model.raw_users.len(),
            model.raw_items.len(),
            model.k,
            start.elapsed()
        );
        Ok(model)
    }

    /// Validate an artifact and build the lookup structures
    pub fn from_artifact(artifact: ModelArtifact) -> std::result::Result<Self, ModelLoadError> {
        let ModelArtifact {
            variant,
            k,
            min_k,
            rating_scale,
            users,
            items,
            ratings,
            similarities,
        } = artifact;

        if k == 0 {
            return Err(ModelLoadError::Invalid("k must be at least 1".into()));
        }
        let (lower, upper) = rating_scale;
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(ModelLoadError::Invalid(format!(
                "rating scale ({}, {}) is not a valid range",
                lower, upper
            )));
        }

        let mut user_index = HashMap::with_capacity(users.len());
        for (inner, raw) in users.iter().enumerate() {
            if user_index.insert(raw.clone(), inner).is_some() {
                return Err(ModelLoadError::Invalid(format!("duplicate user '{}'", raw)));
            }
        }
        let mut item_index = HashMap::with_capacity(items.len());
        for (inner, &raw) in items.iter().enumerate() {
            if item_index.insert(raw, inner).is_some() {
                return Err(ModelLoadError::Invalid(format!("duplicate item {}", raw)));
            }
        }

        let n_items = items.len();
        if similarities.len() != n_items {
            return Err(ModelLoadError::Invalid(format!(
                "similarity matrix has {} rows for {} items",
                similarities.len(),
                n_items
            )));
        }
        let mut flat = Vec::with_capacity(n_items * n_items);
        for (row_idx, row) in similarities.into_iter().enumerate() {
            if row.len() != n_items {
                return Err(ModelLoadError::Invalid(format!(
                    "similarity row {} has {} columns, expected {}",
                    row_idx,
                    row.len(),
                    n_items
                )));
            }
            if row.iter().any(|s| !s.is_finite()) {
                return Err(ModelLoadError::Invalid(format!(
                    "similarity row {} contains a non-finite value",
                    row_idx
                )));
            }
            flat.extend(row);
        }

        let mut user_ratings = vec![Vec::new(); users.len()];
        let mut item_sums = vec![(0.0_f64, 0_usize); n_items];
        let mut total = 0.0;
        for &(uid, iid, rating) in &ratings {
            if uid >= users.len() || iid >= n_items {
                return Err(ModelLoadError::Invalid(format!(
                    "rating ({}, {}) references an unknown inner id",
                    uid, iid
                )));
            }
            if !rating.is_finite() {
                return Err(ModelLoadError::Invalid(format!(
                    "rating ({}, {}) is not finite",
                    uid, iid
                )));
            }
            user_ratings[uid].push((iid, rating));
            item_sums[iid].0 += rating;
            item_sums[iid].1 += 1;
            total += rating;
        }

        let global_mean = if ratings.is_empty() {
            (lower + upper) / 2.0
        } else {
            total / ratings.len() as f64
        };
        if !global_mean.is_finite() {
            return Err(ModelLoadError::Invalid(
                "ratings overflow when averaged".into(),
            ));
        }
        let item_means: Vec<f64> = item_sums
            .into_iter()
            .map(|(sum, count)| {
                if count > 0 {
                    sum / count as f64
                } else {
                    global_mean
                }
            })
            .collect();
        if let Some(iid) = item_means.iter().position(|m| !m.is_finite()) {
            return Err(ModelLoadError::Invalid(format!(
                "ratings of item {} overflow when averaged",
                items[iid]
            )));
        }

        Ok(Self {
            variant,
            k,
            min_k,
            rating_scale,
            global_mean,
            raw_users: users,
            raw_items: items,
            user_index,
            item_index,
            user_ratings,
            item_means,
            similarities: flat,
        })
    }

    pub fn variant(&self) -> KnnVariant {
        self.variant
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn n_items(&self) -> usize {
        self.raw_items.len()
    }

    fn sim(&self, a: InnerId, b: InnerId) -> f64 {
        self.similarities[a * self.raw_items.len() + b]
    }

    /// Core estimator on inner ids. Returns the raw (unclipped) estimate.
    fn estimate(&self, uid: InnerId, iid: InnerId) -> std::result::Result<(f64, usize), Impossible> {
        let mut neighbors: Vec<(InnerId, f64, f64)> = self.user_ratings[uid]
            .iter()
            .map(|&(j, r)| (j, self.sim(iid, j), r))
            .collect();
        // Stable, so equal similarities keep the user's rating order
        neighbors.sort_by(|a, b| b.1.total_cmp(&a.1));
        neighbors.truncate(self.k);

        let mut sum_sim = 0.0;
        let mut sum_ratings = 0.0;
        let mut actual_k = 0;

        match self.variant {
            KnnVariant::Basic => {
                for &(_, sim, r) in &neighbors {
                    if sim > 0.0 {
                        sum_sim += sim;
                        sum_ratings += sim * r;
                        actual_k += 1;
                    }
                }
                if actual_k < self.min_k || sum_sim == 0.0 {
                    return Err(Impossible::NotEnoughNeighbors);
                }
                Ok((sum_ratings / sum_sim, actual_k))
            }
            KnnVariant::WithMeans => {
                let mut est = self.item_means[iid];
                for &(j, sim, r) in &neighbors {
                    if sim > 0.0 {
                        sum_sim += sim;
                        sum_ratings += sim * (r - self.item_means[j]);
                        actual_k += 1;
                    }
                }
                if actual_k < self.min_k {
                    sum_ratings = 0.0;
                }
                if sum_sim > 0.0 {
                    est += sum_ratings / sum_sim;
                }
                Ok((est, actual_k))
            }
        }
    }

    fn clip(&self, est: f64) -> f64 {
        let (lower, upper) = self.rating_scale;
        est.clamp(lower, upper)
    }
}

impl PredictionOracle for KnnModel {
    fn predict(&self, user_id: &str, item_id: ItemId) -> Result<Prediction> {
        let inner_user = self.user_index.get(user_id).copied();
        let inner_item = self.item_index.get(&item_id).copied();

        let outcome = match (inner_user, inner_item) {
            (Some(uid), Some(iid)) => self.estimate(uid, iid).and_then(|(est, k)| {
                // Finite inputs can still overflow the weighted sums
                if est.is_finite() {
                    Ok((est, k))
                } else {
                    Err(Impossible::NonFiniteEstimate)
                }
            }),
            _ => Err(Impossible::UnknownEntity),
        };

        let (est, details) = match outcome {
            Ok((est, actual_k)) => (est, PredictionDetails::estimated(actual_k)),
            Err(reason) => {
                debug!(
                    "Falling back to global mean for user '{}' item {}: {}",
                    user_id, item_id, reason
                );
                (self.global_mean, PredictionDetails::impossible(reason.to_string()))
            }
        };

        Ok(Prediction {
            uid: user_id.to_string(),
            iid: item_id,
            r_ui: None,
            est: self.clip(est),
            details,
        })
    }

    fn neighbors_of(&self, inner: InnerId, k: usize) -> Result<Vec<InnerId>> {
        if inner >= self.raw_items.len() {
            return Err(OracleError::UnknownInnerItem(inner));
        }
        let mut others: Vec<(InnerId, f64)> = (0..self.raw_items.len())
            .filter(|&other| other != inner)
            .map(|other| (other, self.sim(inner, other)))
            .collect();
        others.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(others.into_iter().take(k).map(|(other, _)| other).collect())
    }

    fn to_inner_iid(&self, raw: ItemId) -> Result<InnerId> {
        self.item_index
            .get(&raw)
            .copied()
            .ok_or(OracleError::UnknownItem(raw))
    }

    fn to_raw_iid(&self, inner: InnerId) -> Result<ItemId> {
        self.raw_items
            .get(inner)
            .copied()
            .ok_or(OracleError::UnknownInnerItem(inner))
    }

    fn known_users(&self) -> &[String] {
        &self.raw_users
    }

    fn known_items(&self) -> &[ItemId] {
        &self.raw_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Three users, four items. Item 40 is similar to 10 and 20, dissimilar to 30.
    fn artifact(variant: KnnVariant) -> ModelArtifact {
        ModelArtifact {
            variant,
            k: 40,
            min_k: 1,
            rating_scale: (1.0, 5.0),
            users: vec!["alice".into(), "bob".into(), "carol".into()],
            items: vec![10, 20, 30, 40],
            ratings: vec![
                (0, 0, 5.0),
                (0, 1, 4.0),
                (0, 2, 1.0),
                (1, 0, 2.0),
                (1, 3, 3.0),
                (2, 2, 4.0),
            ],
            similarities: vec![
                vec![1.0, 0.5, 0.1, 0.8],
                vec![0.5, 1.0, 0.0, 0.6],
                vec![0.1, 0.0, 1.0, -0.2],
                vec![0.8, 0.6, -0.2, 1.0],
            ],
        }
    }

    fn model(variant: KnnVariant) -> KnnModel {
        KnnModel::from_artifact(artifact(variant)).unwrap()
    }

    #[test]
    fn test_basic_weighted_average() {
        let model = model(KnnVariant::Basic);
        let prediction = model.predict("alice", 40).unwrap();

        // neighbours of 40 rated by alice: 10 (0.8, 5), 20 (0.6, 4); 30 has negative sim
        let expected = (0.8 * 5.0 + 0.6 * 4.0) / (0.8 + 0.6);
        assert!((prediction.est - expected).abs() < 1e-9);
        assert_eq!(prediction.details, PredictionDetails::estimated(2));
        assert_eq!(prediction.uid, "alice");
        assert_eq!(prediction.iid, 40);
        assert_eq!(prediction.r_ui, None);
    }

    #[test]
    fn test_k_limits_neighbours() {
        let mut artifact = artifact(KnnVariant::Basic);
        artifact.k = 1;
        let model = KnnModel::from_artifact(artifact).unwrap();

        let prediction = model.predict("alice", 40).unwrap();
        assert!((prediction.est - 5.0).abs() < 1e-9);
        assert_eq!(prediction.details.actual_k, Some(1));
    }

    #[test]
    fn test_unknown_user_falls_back_to_global_mean() {
        let model = model(KnnVariant::Basic);
        let prediction = model.predict("mallory", 10).unwrap();

        let mean = (5.0 + 4.0 + 1.0 + 2.0 + 3.0 + 4.0) / 6.0;
        assert!((prediction.est - mean).abs() < 1e-9);
        assert!(prediction.details.was_impossible);
        assert_eq!(
            prediction.details.reason.as_deref(),
            Some("User and/or item is unknown.")
        );

        let prediction = model.predict("alice", 999).unwrap();
        assert!(prediction.details.was_impossible);
    }

    #[test]
    fn test_not_enough_neighbours() {
        let model = model(KnnVariant::Basic);
        // carol only rated 30, which is negatively similar to 40
        let prediction = model.predict("carol", 40).unwrap();
        assert!(prediction.details.was_impossible);
        assert_eq!(prediction.details.reason.as_deref(), Some("Not enough neighbors."));
        assert!((prediction.est - model.global_mean()).abs() < 1e-9);
    }

    #[test]
    fn test_with_means_centres_ratings() {
        let model = model(KnnVariant::WithMeans);
        let prediction = model.predict("alice", 40).unwrap();

        // item means: 10 -> 3.5, 20 -> 4.0, 40 -> 3.0
        let correction = (0.8 * (5.0 - 3.5) + 0.6 * (4.0 - 4.0)) / (0.8 + 0.6);
        assert!((prediction.est - (3.0 + correction)).abs() < 1e-9);
        assert!(!prediction.details.was_impossible);

        // no positive neighbours: just the item mean
        let prediction = model.predict("carol", 40).unwrap();
        assert!((prediction.est - 3.0).abs() < 1e-9);
        assert_eq!(prediction.details.actual_k, Some(0));
    }

    #[test]
    fn test_estimates_are_clipped() {
        let mut artifact = artifact(KnnVariant::Basic);
        artifact.rating_scale = (1.0, 4.0);
        let model = KnnModel::from_artifact(artifact).unwrap();
        // unclipped: (1.0 * 5 + 0.5 * 4 + 0.1 * 1) / 1.6 = 4.4375
        let prediction = model.predict("alice", 10).unwrap();
        assert_eq!(prediction.est, 4.0);
    }

    #[test]
    fn test_overflowing_estimate_falls_back() {
        let model = KnnModel::from_artifact(ModelArtifact {
            variant: KnnVariant::Basic,
            k: 40,
            min_k: 1,
            rating_scale: (-1e308, 1e308),
            users: vec!["u".into()],
            items: vec![1, 2],
            ratings: vec![(0, 0, 1e308)],
            similarities: vec![vec![1e308, 1e308], vec![1e308, 1e308]],
        })
        .unwrap();

        // sim * rating overflows to infinity
        let prediction = model.predict("u", 2).unwrap();
        assert!(prediction.est.is_finite());
        assert_eq!(prediction.est, model.global_mean());
        assert!(prediction.details.was_impossible);
        assert_eq!(
            prediction.details.reason.as_deref(),
            Some("Estimate is not a finite number.")
        );
    }

    #[test]
    fn test_overflowing_ratings_rejected() {
        let mut bad = artifact(KnnVariant::Basic);
        bad.rating_scale = (-1e308, 1e308);
        bad.ratings = vec![(0, 0, 1e308), (1, 0, 1e308)];
        assert!(matches!(
            KnnModel::from_artifact(bad),
            Err(ModelLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_neighbors_exclude_self_and_sort() {
        let model = model(KnnVariant::Basic);
        let inner = model.to_inner_iid(40).unwrap();
        let neighbors = model.neighbors_of(inner, 10).unwrap();

        assert_eq!(neighbors.len(), 3);
        assert!(!neighbors.contains(&inner));
        let raw: Vec<ItemId> = neighbors
            .iter()
            .map(|&n| model.to_raw_iid(n).unwrap())
            .collect();
        assert_eq!(raw, vec![10, 20, 30]);

        assert_eq!(model.neighbors_of(inner, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_neighbor_ties_keep_inner_order() {
        let artifact = ModelArtifact {
            users: vec![],
            items: vec![1, 2, 3, 4],
            ratings: vec![],
            similarities: vec![
                vec![1.0, 0.3, 0.3, 0.3],
                vec![0.3, 1.0, 0.0, 0.0],
                vec![0.3, 0.0, 1.0, 0.0],
                vec![0.3, 0.0, 0.0, 1.0],
            ],
            ..artifact(KnnVariant::Basic)
        };
        let model = KnnModel::from_artifact(artifact).unwrap();
        assert_eq!(model.neighbors_of(0, 10).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_id_mapping_errors() {
        let model = model(KnnVariant::Basic);
        assert_eq!(model.to_inner_iid(30).unwrap(), 2);
        assert_eq!(model.to_raw_iid(2).unwrap(), 30);
        assert_eq!(model.to_inner_iid(31), Err(OracleError::UnknownItem(31)));
        assert_eq!(model.to_raw_iid(9), Err(OracleError::UnknownInnerItem(9)));
        assert!(model.neighbors_of(9, 3).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalid_artifacts_rejected() {
        let mut bad = artifact(KnnVariant::Basic);
        bad.similarities.pop();
        assert!(matches!(
            KnnModel::from_artifact(bad),
            Err(ModelLoadError::Invalid(_))
        ));

        let mut bad = artifact(KnnVariant::Basic);
        bad.ratings.push((7, 0, 3.0));
        assert!(matches!(
            KnnModel::from_artifact(bad),
            Err(ModelLoadError::Invalid(_))
        ));

        let mut bad = artifact(KnnVariant::Basic);
        bad.items[1] = 10;
        assert!(matches!(
            KnnModel::from_artifact(bad),
            Err(ModelLoadError::Invalid(_))
        ));

        let mut bad = artifact(KnnVariant::Basic);
        bad.k = 0;
        assert!(matches!(
            KnnModel::from_artifact(bad),
            Err(ModelLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&artifact(KnnVariant::Basic)).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let model = KnnModel::load_from_file(file.path()).unwrap();
        assert_eq!(model.n_items(), 4);
        assert_eq!(model.known_users().len(), 3);
        assert_eq!(model.known_items(), &[10, 20, 30, 40]);
    }

    #[test]
    fn test_load_errors() {
        let err = KnnModel::load_from_file(Path::new("missing/model.json")).unwrap_err();
        assert!(matches!(err, ModelLoadError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = KnnModel::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ModelLoadError::Json(_)));
    }
}

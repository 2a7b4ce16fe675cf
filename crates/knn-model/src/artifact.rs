//! On-disk representation of a fitted k-NN model.
//!
//! The training pipeline writes one JSON document:
//!
//! ```json
//! {
//!   "variant": "basic",
//!   "k": 40,
//!   "min_k": 1,
//!   "rating_scale": [1.0, 5.0],
//!   "users": ["alice", "bob"],
//!   "items": [1234, 5678],
//!   "ratings": [[0, 0, 4.5], [1, 1, 3.0]],
//!   "similarities": [[1.0, 0.2], [0.2, 1.0]]
//! }
//! ```
//!
//! `users[u]` and `items[i]` define the inner index spaces used by `ratings`
//! and `similarities`.

use serde::{Deserialize, Serialize};

use crate::oracle::ItemId;

/// Which neighbourhood estimator the model was fitted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnVariant {
    /// Similarity-weighted average of the user's ratings
    #[default]
    Basic,
    /// Same, but on ratings centred on each item's mean
    WithMeans,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub variant: KnnVariant,
    /// Maximum number of neighbours used per estimate
    #[serde(default = "default_k")]
    pub k: usize,
    /// Minimum number of contributing neighbours for a real estimate
    #[serde(default = "default_min_k")]
    pub min_k: usize,
    #[serde(default = "default_rating_scale")]
    pub rating_scale: (f64, f64),
    pub users: Vec<String>,
    pub items: Vec<ItemId>,
    /// `(inner_uid, inner_iid, rating)` triples
    pub ratings: Vec<(usize, usize, f64)>,
    /// Dense item-item similarity matrix, `items.len()` square
    pub similarities: Vec<Vec<f64>>,
}

fn default_k() -> usize {
    40
}

fn default_min_k() -> usize {
    1
}

fn default_rating_scale() -> (f64, f64) {
    (1.0, 5.0)
}

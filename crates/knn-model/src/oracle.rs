//! The prediction oracle capability.
//!
//! Everything that serves recommendations talks to the model through this
//! trait, so tests can swap in a deterministic double.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// External (raw) item id, shared with the beer catalog
pub type ItemId = u32;

/// The model's private dense index for an item
pub type InnerId = usize;

/// Outcome of a single rating prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub uid: String,
    pub iid: ItemId,
    /// True rating, when one was supplied. Always `None` at serving time.
    pub r_ui: Option<f64>,
    /// Estimated rating, clipped to the model's rating scale
    pub est: f64,
    pub details: PredictionDetails,
}

/// How the estimate was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDetails {
    pub was_impossible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Number of neighbours that contributed to the estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_k: Option<usize>,
}

impl PredictionDetails {
    pub fn estimated(actual_k: usize) -> Self {
        Self {
            was_impossible: false,
            reason: None,
            actual_k: Some(actual_k),
        }
    }

    pub fn impossible(reason: impl Into<String>) -> Self {
        Self {
            was_impossible: true,
            reason: Some(reason.into()),
            actual_k: None,
        }
    }
}

/// A pre-trained model able to score (user, item) pairs and find similar items.
///
/// Implementations are read-only after construction, so one instance is
/// shared by every request thread.
pub trait PredictionOracle: Send + Sync {
    /// Predict the rating `user_id` would give `item_id`.
    ///
    /// Unknown users or items are not an error: the model falls back to a
    /// baseline estimate and flags the prediction as impossible.
    fn predict(&self, user_id: &str, item_id: ItemId) -> Result<Prediction>;

    /// The `k` items most similar to `inner`, most similar first
    fn neighbors_of(&self, inner: InnerId, k: usize) -> Result<Vec<InnerId>>;

    fn to_inner_iid(&self, raw: ItemId) -> Result<InnerId>;

    fn to_raw_iid(&self, inner: InnerId) -> Result<ItemId>;

    /// Raw ids of every user in the trainset
    fn known_users(&self) -> &[String];

    /// Raw ids of every item in the trainset, in inner-id order
    fn known_items(&self) -> &[ItemId];
}

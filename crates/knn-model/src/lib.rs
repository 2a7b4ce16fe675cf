//! Pre-trained k-NN collaborative-filtering model.
//!
//! This crate provides:
//! - The `PredictionOracle` trait every caller programs against
//! - `KnnModel`, an item-based neighbourhood model restored from the JSON
//!   artifact written by the training pipeline
//! - Error types for querying and loading
//!
//! ## Example Usage
//! ```ignore
//! use knn_model::{KnnModel, PredictionOracle};
//! use std::path::Path;
//!
//! let model = KnnModel::load_from_file(Path::new("data/dump/knn_model.json"))?;
//! let prediction = model.predict("beerlover42", 1234)?;
//!
//! let inner = model.to_inner_iid(1234)?;
//! let similar = model.neighbors_of(inner, 10)?;
//! ```

pub mod artifact;
pub mod error;
pub mod model;
pub mod oracle;

pub use artifact::{KnnVariant, ModelArtifact};
pub use error::{ModelLoadError, OracleError, Result};
pub use model::KnnModel;
pub use oracle::{InnerId, ItemId, Prediction, PredictionDetails, PredictionOracle};

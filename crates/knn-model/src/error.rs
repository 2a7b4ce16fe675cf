//! Errors raised by the prediction oracle and by model loading.

use thiserror::Error;

use crate::oracle::{InnerId, ItemId};

/// Errors that can occur when querying the oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Item {0} is not part of the trainset")]
    UnknownItem(ItemId),

    #[error("Inner item id {0} is out of range")]
    UnknownInnerItem(InnerId),

    #[error("Prediction failed for user '{user}' and item {item}: {reason}")]
    PredictionFailed {
        user: String,
        item: ItemId,
        reason: String,
    },
}

impl OracleError {
    /// True when the failure means "the model has never seen this item"
    pub fn is_not_found(&self) -> bool {
        matches!(self, OracleError::UnknownItem(_) | OracleError::UnknownInnerItem(_))
    }
}

/// Errors that can occur while reading a persisted model artifact
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;

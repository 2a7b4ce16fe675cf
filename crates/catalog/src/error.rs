//! Error types for the beer-catalog crate.

use thiserror::Error;

use crate::types::BeerId;

/// Errors that can occur while loading or querying the beer catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in the metadata table couldn't be parsed
    ///
    /// Carries the file name and 1-based line number of the offending row
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A field parsed but holds a value the catalog cannot accept
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Two rows share the same beer id
    #[error("Duplicate beer id {0} in catalog")]
    DuplicateBeer(BeerId),

    /// No record with this id
    #[error("Beer {0} not found")]
    BeerNotFound(BeerId),

    /// No record with this display name
    #[error("Beer named '{0}' not found")]
    NameNotFound(String),
}

impl CatalogError {
    /// True for the lookup failures callers usually surface as "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::BeerNotFound(_) | CatalogError::NameNotFound(_))
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogError>;

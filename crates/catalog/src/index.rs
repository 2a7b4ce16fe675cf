//! Catalog building, validation and search.

use crate::error::{CatalogError, Result};
use crate::parser;
use crate::types::*;
use std::path::Path;
use std::time::Instant;
use tracing::info;

impl Catalog {
    /// Load the beer metadata table from disk
    ///
    /// Steps:
    /// 1. Parse the table into records (file order preserved)
    /// 2. Insert them, rejecting duplicate ids
    /// 3. Validate values
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading beer catalog from {:?}", path);
        let start = Instant::now();

        let beers = parser::parse_beers(path)?;
        let catalog = Catalog::from_records(beers)?;
        catalog.validate()?;

        info!(
            "Loaded {} beers ({} distinct names) in {:.2?}",
            catalog.len(),
            catalog.by_name.len(),
            start.elapsed()
        );
        Ok(catalog)
    }

    /// Check that every mean score is a finite number
    pub fn validate(&self) -> Result<()> {
        for record in &self.records {
            if !record.mean_score.is_finite() {
                return Err(CatalogError::InvalidValue {
                    field: format!("score of beer {}", record.id),
                    value: record.mean_score.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Case-insensitive substring search over display names.
    ///
    /// Exact matches come first, then higher mean scores.
    pub fn search(&self, fragment: &str) -> Vec<&BeerRecord> {
        let needle = fragment.to_lowercase();
        let mut matches: Vec<(bool, &BeerRecord)> = self
            .records
            .iter()
            .filter_map(|record| {
                let name = record.display_name.to_lowercase();
                if name == needle {
                    Some((true, record))
                } else if name.contains(&needle) {
                    Some((false, record))
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| rank_score(b.1).total_cmp(&rank_score(a.1)))
        });
        matches.into_iter().map(|(_, record)| record).collect()
    }
}

/// Unscored (NaN) beers sort after every real score
fn rank_score(record: &BeerRecord) -> f64 {
    if record.mean_score.is_nan() {
        f64::NEG_INFINITY
    } else {
        record.mean_score
    }
}

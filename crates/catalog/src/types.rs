//! Core domain types for the beer catalog.
//!
//! The catalog is a read-only table loaded once at startup. Records keep the
//! order they had in the metadata artifact; that order is what every full
//! scan (and every stable sort built on one) sees.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CatalogError, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a beer, as assigned by the upstream dataset
pub type BeerId = u32;

/// Placeholder entry appended to the dropdown listing
pub const CHOOSE_A_BEER: &str = "Choose a Beer";

// =============================================================================
// Beer Record
// =============================================================================

/// One row of the beer metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeerRecord {
    pub id: BeerId,
    /// Brewery/name composite shown to users, with `/` replaced by `-`
    pub display_name: String,
    pub style: String,
    /// Mean historical score for this beer
    pub mean_score: f64,
}

impl BeerRecord {
    pub fn new(
        id: BeerId,
        display_name: impl Into<String>,
        style: impl Into<String>,
        mean_score: f64,
    ) -> Self {
        Self {
            id,
            display_name: normalize_display_name(&display_name.into()),
            style: style.into(),
            mean_score,
        }
    }
}

/// Display names end up in URL paths, so `/` is not allowed in them
pub fn normalize_display_name(raw: &str) -> String {
    raw.replace('/', "-")
}

// =============================================================================
// Catalog - The In-Memory Table
// =============================================================================

/// All beer records plus the indices used for lookups.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Records in artifact order
    pub(crate) records: Vec<BeerRecord>,
    /// Position of each record in `records`
    pub(crate) by_id: HashMap<BeerId, usize>,
    /// First record carrying each display name
    pub(crate) by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Creates a new, empty Catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from records, rejecting duplicate ids
    pub fn from_records(records: impl IntoIterator<Item = BeerRecord>) -> Result<Self> {
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record)?;
        }
        Ok(catalog)
    }

    /// Insert a record at the end of the catalog.
    ///
    /// Fails if the id is already present. A repeated display name is kept,
    /// but name lookups keep resolving to the earlier record.
    pub fn insert(&mut self, record: BeerRecord) -> Result<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(CatalogError::DuplicateBeer(record.id));
        }
        let position = self.records.len();
        self.by_id.insert(record.id, position);
        self.by_name
            .entry(record.display_name.clone())
            .or_insert(position);
        self.records.push(record);
        Ok(())
    }

    /// Get a record by id
    pub fn get(&self, id: BeerId) -> Option<&BeerRecord> {
        self.by_id.get(&id).map(|&pos| &self.records[pos])
    }

    /// Get a record by id, failing with `BeerNotFound`
    pub fn lookup_by_id(&self, id: BeerId) -> Result<&BeerRecord> {
        self.get(id).ok_or(CatalogError::BeerNotFound(id))
    }

    /// Resolve a display name to its beer id.
    ///
    /// Display names are not unique; the first record in catalog order wins.
    pub fn lookup_id_by_name(&self, display_name: &str) -> Result<BeerId> {
        self.by_name
            .get(display_name)
            .map(|&pos| self.records[pos].id)
            .ok_or_else(|| CatalogError::NameNotFound(display_name.to_string()))
    }

    pub fn contains(&self, id: BeerId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All display names sorted ascending, followed by the placeholder entry
    pub fn list_display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .map(|r| r.display_name.clone())
            .collect();
        names.sort();
        names.push(CHOOSE_A_BEER.to_string());
        names
    }

    /// Records in catalog order
    pub fn iter(&self) -> std::slice::Iter<'_, BeerRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[BeerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a BeerRecord;
    type IntoIter = std::slice::Iter<'a, BeerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//! # Beer Catalog Crate
//!
//! Loads the beer metadata table produced by the training pipeline and keeps
//! it in memory for the lifetime of the process.
//!
//! ## Main Components
//!
//! - **types**: `BeerRecord` and the `Catalog` table with its lookups
//! - **parser**: Parse the tab-separated metadata file
//! - **index**: Load, validate and search the catalog
//! - **error**: Error types for loading and lookups
//!
//! ## Example Usage
//!
//! ```ignore
//! use beer_catalog::Catalog;
//! use std::path::Path;
//!
//! let catalog = Catalog::load_from_file(Path::new("data/dump/beer_final.tsv"))?;
//!
//! let id = catalog.lookup_id_by_name("Heady Topper;The Alchemist")?;
//! let beer = catalog.lookup_by_id(id)?;
//! println!("{} ({}) scores {:.2}", beer.display_name, beer.style, beer.mean_score);
//! ```

pub mod error;
pub mod types;
pub mod parser;
pub mod index;

pub use error::{CatalogError, Result};
pub use types::{normalize_display_name, BeerId, BeerRecord, Catalog, CHOOSE_A_BEER};

//! Server crate for the beer recommender.
//!
//! This crate contains the recommender that joins model output with the
//! beer catalog, and the HTTP surface in front of it.

pub mod config;
pub mod error;
pub mod pages;
pub mod recommender;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use beer_catalog::Catalog;
use knn_model::{KnnModel, PredictionOracle};
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::RecommendError;
pub use recommender::{
    BeerRecommender, BeerRef, NeighborRecord, PickBucket, PredictionResult, RankedPick,
    RankerConfig, UserRanking,
};
pub use routes::{AppState, router};

/// Load both artifacts in parallel and build the recommender.
pub fn load_recommender(
    beers_path: &std::path::Path,
    model_path: &std::path::Path,
    ranker: RankerConfig,
) -> Result<BeerRecommender> {
    let start = Instant::now();

    let (catalog, model) = rayon::join(
        || Catalog::load_from_file(beers_path),
        || KnnModel::load_from_file(model_path),
    );
    let catalog = catalog
        .with_context(|| format!("Failed to load beer catalog from {}", beers_path.display()))?;
    let model = model
        .with_context(|| format!("Failed to load k-NN model from {}", model_path.display()))?;

    let missing = count_missing_items(&catalog, &model);
    if missing > 0 {
        warn!(
            "{} of {} model items have no catalog entry; their neighbour reports will fail",
            missing,
            model.known_items().len()
        );
    }

    info!(
        "Artifacts loaded in {:.2?} ({} beers, {} model items, {} workers, deadline {:?})",
        start.elapsed(),
        catalog.len(),
        model.known_items().len(),
        ranker.workers,
        ranker.deadline
    );

    let recommender = BeerRecommender::new(Arc::new(catalog), Arc::new(model), ranker)?;
    Ok(recommender)
}

fn count_missing_items(catalog: &Catalog, oracle: &dyn PredictionOracle) -> usize {
    oracle
        .known_items()
        .iter()
        .filter(|&&id| !catalog.contains(id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beer_catalog::BeerRecord;
    use knn_model::{KnnVariant, ModelArtifact};
    use std::io::Write;

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            variant: KnnVariant::Basic,
            k: 10,
            min_k: 1,
            rating_scale: (1.0, 5.0),
            users: vec!["u1".into()],
            items: vec![1, 2, 3],
            ratings: vec![(0, 0, 4.0)],
            similarities: vec![
                vec![1.0, 0.5, 0.2],
                vec![0.5, 1.0, 0.1],
                vec![0.2, 0.1, 1.0],
            ],
        }
    }

    #[test]
    fn test_count_missing_items() {
        let catalog =
            Catalog::from_records([BeerRecord::new(1, "A;X", "Stout", 4.0)]).unwrap();
        let model = KnnModel::from_artifact(artifact()).unwrap();
        assert_eq!(count_missing_items(&catalog, &model), 2);
    }

    #[test]
    fn test_load_recommender_from_files() {
        let mut beers = tempfile::NamedTempFile::new().unwrap();
        beers
            .write_all(b"beer_id\tbeer_brewery\tstyle\tscore\n1\tA;X\tStout\t4.0\n2\tB;Y\tIPA\t3.5\n3\tC;Z\tPorter\t3.9\n")
            .unwrap();
        let mut model = tempfile::NamedTempFile::new().unwrap();
        model
            .write_all(serde_json::to_string(&artifact()).unwrap().as_bytes())
            .unwrap();

        let recommender =
            load_recommender(beers.path(), model.path(), RankerConfig::default()).unwrap();
        assert_eq!(recommender.catalog().len(), 3);
        assert_eq!(recommender.neighbors(1, 10).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_load_recommender_reports_missing_file() {
        let err = load_recommender(
            std::path::Path::new("missing/beers.tsv"),
            std::path::Path::new("missing/model.json"),
            RankerConfig::default(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("beer catalog"));
    }
}

//! HTTP routes.
//!
//! | method | path                      | response                              |
//! |--------|---------------------------|---------------------------------------|
//! | GET    | `/`, `/index.html`        | static pages                          |
//! | GET    | `/knnrecommender.html`    | page with the beer dropdown           |
//! | GET    | `/neighbors/{beer_name}`  | JSON neighbour report                 |
//! | POST   | `/predict`                | JSON array with one prediction        |
//! | GET    | `/userpredict/{username}` | JSON Top10 picks then Bottom10 picks  |
//! | GET    | `/userpredict.html`       | static page                           |
//! | GET    | `/health`                 | `OK`                                  |

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{RecommendError, Result};
use crate::pages;
use crate::recommender::{BeerRecommender, BeerRef, NeighborRecord, PredictionResult, RankedPick};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<BeerRecommender>,
}

impl AppState {
    pub fn new(recommender: BeerRecommender) -> Self {
        Self {
            recommender: Arc::new(recommender),
        }
    }
}

/// Body of `POST /predict`
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub username: String,
    pub beer: BeerRef,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/index.html", get(index))
        .route("/knnrecommender.html", get(recommender_selector))
        .route("/neighbors/:beer_name", get(nearest_neighbors))
        .route("/predict", post(predict))
        .route("/userpredict/:username", get(user_predict))
        .route("/userpredict.html", get(user_predict_page))
        .route("/health", get(health_check))
        .fallback(invalid_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn landing() -> Html<&'static str> {
    Html(pages::LANDING_PAGE)
}

async fn index() -> Html<&'static str> {
    Html(pages::INDEX_PAGE)
}

async fn user_predict_page() -> Html<&'static str> {
    Html(pages::USER_PREDICT_PAGE)
}

async fn invalid_route() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(pages::NOT_FOUND_PAGE))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn recommender_selector(State(state): State<AppState>) -> Html<String> {
    let names = state.recommender.list_display_names();
    Html(pages::render_recommender(&names))
}

async fn nearest_neighbors(
    State(state): State<AppState>,
    Path(beer_name): Path<String>,
) -> Result<Json<Vec<NeighborRecord>>> {
    debug!("Neighbour lookup for '{}'", beer_name);
    let report = state.recommender.neighbor_report_by_name(&beer_name)?;
    Ok(Json(report))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>> {
    let Json(request) =
        payload.map_err(|rejection| RecommendError::BadRequest(rejection.body_text()))?;
    debug!("Prediction for user '{}' and {:?}", request.username, request.beer);

    let result = state
        .recommender
        .predict_one(&request.username, &request.beer)?;
    Ok(Json(vec![result]))
}

async fn user_predict(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<RankedPick>>> {
    let ranking = state.recommender.rank_for_user(&username).await?;
    Ok(Json(ranking.into_combined()))
}

use crate::cache::GenreSource;
use crate::foundation::models::{GenreDistribution, Period};
use crate::server::ApiError;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn GenreSource>,
}

impl AppState {
    pub fn new(source: Arc<dyn GenreSource>) -> Self {
        Self { source }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenresResponse {
    pub genres: GenreDistribution,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /genre-analysis?period=1month
pub async fn genre_analysis(
    State(state): State<AppState>,
    Query(query): Query<GenreQuery>,
) -> Result<Json<GenresResponse>, ApiError> {
    let period = match query.period.as_deref() {
        None | Some("") => Period::default(),
        Some(raw) => raw
            .parse::<Period>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    };

    let genres = state.source.fetch_genres(period).await.map_err(|e| {
        error!(period = %period, error = %e, "Failed to analyze genres");
        ApiError::Internal("Failed to analyze genres".to_string())
    })?;

    Ok(Json(GenresResponse { genres }))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/genre-analysis", get(genre_analysis))
        .route("/health", get(health))
        .with_state(state)
}

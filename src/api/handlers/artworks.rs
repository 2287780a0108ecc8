//! Catalog sync handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::PutArtworkRequest;
use crate::app_state::AppState;
use crate::domain::{Artwork, ArtworkId, Caller};
use crate::error::{ErrorResponse, MarketError};

/// `GET /artworks/{id}` — Ledger view of an artwork.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] for an unknown artwork.
#[utoipa::path(
    get,
    path = "/api/v1/artworks/{id}",
    tag = "Catalog",
    summary = "Get artwork",
    params(("id" = ArtworkId, Path, description = "Artwork identifier")),
    responses(
        (status = 200, description = "Artwork", body = Artwork),
        (status = 404, description = "Unknown artwork", body = ErrorResponse),
    )
)]
pub async fn get_artwork(
    State(state): State<AppState>,
    Path(id): Path<ArtworkId>,
) -> Result<impl IntoResponse, MarketError> {
    let artwork = state.catalog_service.get(id).await?;
    Ok(Json(artwork))
}

/// `PUT /artworks/{id}` — Push the catalog's record for an artwork.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins or an invalid record.
#[utoipa::path(
    put,
    path = "/api/v1/artworks/{id}",
    tag = "Catalog",
    summary = "Sync artwork",
    description = "Inserts or replaces the title, artist, price and stock flag of an artwork. Existing orders keep their price snapshot.",
    params(("id" = ArtworkId, Path, description = "Artwork identifier")),
    request_body = PutArtworkRequest,
    responses(
        (status = 200, description = "Artwork stored", body = Artwork),
        (status = 400, description = "Invalid record", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn put_artwork(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ArtworkId>,
    Json(req): Json<PutArtworkRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let artwork = state.catalog_service.put(&caller, id, req.into()).await?;
    Ok(Json(artwork))
}

/// Catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/artworks/{id}", get(get_artwork).put(put_artwork))
}

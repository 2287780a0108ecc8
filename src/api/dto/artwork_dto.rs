//! Catalog sync DTOs.

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::UserId;
use crate::service::ArtworkRecord;

/// Request body for `PUT /artworks/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PutArtworkRequest {
    /// Display title.
    pub title: String,
    /// Fulfilling artist, if known.
    #[serde(default)]
    pub artist_id: Option<UserId>,
    /// Current price.
    pub price: Decimal,
    /// Whether the original is available.
    pub in_stock: bool,
}

impl From<PutArtworkRequest> for ArtworkRecord {
    fn from(req: PutArtworkRequest) -> Self {
        Self {
            title: req.title,
            artist_id: req.artist_id,
            price: req.price,
            in_stock: req.in_stock,
        }
    }
}

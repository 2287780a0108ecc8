//! Catalog sync: the catalog collaborator pushes artwork records here.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::{Artwork, ArtworkId, Caller, UserId};
use crate::error::MarketError;
use crate::payment::money;
use crate::persistence::MarketStore;

/// Artwork record as pushed by the catalog.
#[derive(Debug, Clone)]
pub struct ArtworkRecord {
    /// Display title.
    pub title: String,
    /// Fulfilling artist.
    pub artist_id: Option<UserId>,
    /// Current price.
    pub price: Decimal,
    /// Whether the original is available.
    pub in_stock: bool,
}

/// Read/write access to the inventory ledger.
#[derive(Debug, Clone)]
pub struct CatalogService {
    store: Arc<dyn MarketStore>,
    currency: String,
}

impl CatalogService {
    /// Creates a new `CatalogService` for prices in `currency`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    /// Looks up an artwork.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] for an unknown id.
    pub async fn get(&self, id: ArtworkId) -> Result<Artwork, MarketError> {
        self.store
            .artwork(id)
            .await?
            .ok_or_else(|| MarketError::not_found("artwork", id))
    }

    /// Inserts or replaces an artwork. Admin only.
    ///
    /// Placed orders keep their own price snapshot, so repricing here
    /// never changes an existing order's total.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] for non-admin callers,
    /// [`MarketError::Validation`] for a blank title, a negative price or a
    /// price finer than the currency's minor unit.
    pub async fn put(
        &self,
        caller: &Caller,
        id: ArtworkId,
        record: ArtworkRecord,
    ) -> Result<Artwork, MarketError> {
        caller.require_admin()?;
        if record.title.trim().is_empty() {
            return Err(MarketError::Validation("title is required".to_string()));
        }
        if record.price.is_sign_negative() {
            return Err(MarketError::Validation(format!(
                "price must not be negative, got {}",
                record.price
            )));
        }
        money::check_precision(record.price, &self.currency)?;

        let artwork = Artwork {
            id,
            title: record.title.trim().to_string(),
            artist_id: record.artist_id,
            price: record.price,
            in_stock: record.in_stock,
            updated_at: Utc::now(),
        };
        self.store.put_artwork(&artwork).await?;
        tracing::info!(artwork_id = %id, price = %artwork.price, in_stock = artwork.in_stock, "artwork synced");
        Ok(artwork)
    }
}

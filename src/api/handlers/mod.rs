//! REST endpoint handlers organized by resource.

pub mod artworks;
pub mod cart;
pub mod gift_cards;
pub mod orders;
pub mod payments;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(cart::routes())
        .merge(orders::routes())
        .merge(payments::routes())
        .merge(gift_cards::routes())
        .merge(artworks::routes())
}

//! Cart DTOs: line requests, cart views and the guest merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ArtworkId, CartItem, CartItemId, CartLine, ItemType, Owner, PrintSize};
use crate::service::MergeReport;

/// One purchasable line: used by `POST /cart/items` and by direct
/// checkout in `POST /orders`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct CartLineRequest {
    /// Artwork to buy.
    pub artwork_id: ArtworkId,
    /// Units. Defaults to 1; an ORIGINAL is always exactly 1.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// `ORIGINAL` or `PRINT`.
    pub item_type: ItemType,
    /// Required for prints, absent for originals.
    #[serde(default)]
    pub print_size: Option<PrintSize>,
}

fn default_quantity() -> u32 {
    1
}

impl From<CartLineRequest> for CartLine {
    fn from(req: CartLineRequest) -> Self {
        Self {
            artwork_id: req.artwork_id,
            quantity: req.quantity,
            item_type: req.item_type,
            print_size: req.print_size,
        }
    }
}

/// Request body for `PATCH /cart/items/{id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// New quantity.
    pub quantity: u32,
}

/// Request body for `POST /cart/merge`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeCartRequest {
    /// Anonymous session whose cart is folded into the caller's.
    pub guest_session: String,
}

/// A stored cart line.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    /// Line identifier.
    pub id: CartItemId,
    /// Artwork on the line.
    pub artwork_id: ArtworkId,
    /// `ORIGINAL` or `PRINT`.
    pub item_type: ItemType,
    /// Print size, for prints.
    pub print_size: Option<PrintSize>,
    /// Units.
    pub quantity: u32,
    /// When the line was first added.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id,
            artwork_id: item.artwork_id,
            item_type: item.item_type,
            print_size: item.print_size,
            quantity: item.quantity,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Response body for `GET /cart`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    /// Identity the cart belongs to (`user:<uuid>` or `guest:<session>`).
    pub owner: String,
    /// Lines, oldest first.
    pub items: Vec<CartItemResponse>,
    /// Sum of all line quantities.
    pub total_quantity: u64,
}

impl CartResponse {
    /// Builds the view of `owner`'s cart.
    #[must_use]
    pub fn new(owner: &Owner, items: Vec<CartItem>) -> Self {
        let total_quantity = items.iter().map(|i| u64::from(i.quantity)).sum();
        Self {
            owner: owner.to_string(),
            items: items.into_iter().map(CartItemResponse::from).collect(),
            total_quantity,
        }
    }
}

/// Response body for `POST /cart/merge`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MergeCartResponse {
    /// Guest lines folded into the user's cart.
    pub merged: usize,
    /// Guest lines dropped because their artwork no longer exists.
    pub dropped: usize,
    /// The user's cart after the merge.
    pub cart: CartResponse,
}

impl MergeCartResponse {
    /// Wraps a [`MergeReport`] for `owner`.
    #[must_use]
    pub fn new(owner: &Owner, report: MergeReport) -> Self {
        Self {
            merged: report.merged,
            dropped: report.dropped,
            cart: CartResponse::new(owner, report.cart),
        }
    }
}

/// Response body for `DELETE /cart`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCartResponse {
    /// Number of lines removed.
    pub removed: u64,
}

//! Cart lines held per identity before checkout.
//!
//! Lines are unique per [`CartKey`]. Adding a line whose key already
//! exists folds the quantity into the existing row instead of inserting a
//! second one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artwork::MAX_LINE_QUANTITY;
use super::{ArtworkId, CartItemId, ItemType, Owner, PrintSize};
use crate::error::MarketError;

/// Composite identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartKey {
    /// Owning identity.
    pub owner: Owner,
    /// Referenced artwork.
    pub artwork_id: ArtworkId,
    /// Sale format.
    pub item_type: ItemType,
    /// Print size, `None` for originals.
    pub print_size: Option<PrintSize>,
}

/// Requested line, validated but not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Referenced artwork.
    pub artwork_id: ArtworkId,
    /// Requested quantity.
    pub quantity: u32,
    /// Sale format.
    pub item_type: ItemType,
    /// Print size, `None` for originals.
    pub print_size: Option<PrintSize>,
}

impl CartLine {
    /// Validates quantity and print-size rules for the line's type.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] on malformed lines.
    pub fn validate(&self) -> Result<(), MarketError> {
        self.item_type.validate_line(self.quantity, self.print_size)
    }

    /// Key of this line under the given owner.
    #[must_use]
    pub fn key(&self, owner: &Owner) -> CartKey {
        CartKey {
            owner: owner.clone(),
            artwork_id: self.artwork_id,
            item_type: self.item_type,
            print_size: self.print_size,
        }
    }
}

/// Persisted cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Row identifier.
    pub id: CartItemId,
    /// Owning identity.
    pub owner: Owner,
    /// Referenced artwork.
    pub artwork_id: ArtworkId,
    /// Sale format.
    pub item_type: ItemType,
    /// Print size, `None` for originals.
    pub print_size: Option<PrintSize>,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last quantity change.
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Creates a fresh row for `line` under `owner`.
    #[must_use]
    pub fn new(owner: Owner, line: &CartLine, now: DateTime<Utc>) -> Self {
        Self {
            id: CartItemId::new(),
            owner,
            artwork_id: line.artwork_id,
            item_type: line.item_type,
            print_size: line.print_size,
            quantity: line.quantity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Composite key of this row.
    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey {
            owner: self.owner.clone(),
            artwork_id: self.artwork_id,
            item_type: self.item_type,
            print_size: self.print_size,
        }
    }

    /// The row viewed as a requested line.
    #[must_use]
    pub const fn as_line(&self) -> CartLine {
        CartLine {
            artwork_id: self.artwork_id,
            quantity: self.quantity,
            item_type: self.item_type,
            print_size: self.print_size,
        }
    }

    /// Folds `quantity` more units into this row.
    ///
    /// Originals stay at 1; prints sum and saturate at
    /// [`MAX_LINE_QUANTITY`].
    pub fn absorb(&mut self, quantity: u32, now: DateTime<Utc>) {
        self.quantity = match self.item_type {
            ItemType::Original => 1,
            ItemType::Print => self.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY),
        };
        self.updated_at = now;
    }
}

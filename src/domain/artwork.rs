//! Catalog artwork record and sale formats.
//!
//! The catalog collaborator owns artworks; this service reads their price
//! and flips `in_stock` for originals. Prints are never stock-gated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ArtworkId, UserId};
use crate::error::MarketError;

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Format an artwork is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    /// The unique physical piece. At most one sale.
    Original,
    /// A reproduction. Unlimited.
    Print,
}

impl ItemType {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "ORIGINAL",
            Self::Print => "PRINT",
        }
    }

    /// Validates the shape of a line of this type.
    ///
    /// An ORIGINAL line has quantity exactly 1 and no print size; a PRINT
    /// line needs a print size and a quantity in `1..=MAX_LINE_QUANTITY`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] describing the first violation.
    pub fn validate_line(self, quantity: u32, print_size: Option<PrintSize>) -> Result<(), MarketError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(MarketError::Validation(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}, got {quantity}"
            )));
        }
        match (self, print_size) {
            (Self::Original, Some(_)) => Err(MarketError::Validation(
                "an original cannot have a print size".to_string(),
            )),
            (Self::Original, None) if quantity != 1 => Err(MarketError::Validation(
                "an original can only be bought once".to_string(),
            )),
            (Self::Print, None) => Err(MarketError::Validation(
                "a print requires a print size".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORIGINAL" => Ok(Self::Original),
            "PRINT" => Ok(Self::Print),
            other => Err(MarketError::Validation(format!("unknown item type: {other}"))),
        }
    }
}

/// Paper size of a printed reproduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrintSize {
    /// 210 × 297 mm.
    A4,
    /// 297 × 420 mm.
    A3,
    /// 420 × 594 mm.
    A2,
    /// 594 × 841 mm.
    A1,
}

impl PrintSize {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::A2 => "A2",
            Self::A1 => "A1",
        }
    }
}

impl fmt::Display for PrintSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintSize {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A4" => Ok(Self::A4),
            "A3" => Ok(Self::A3),
            "A2" => Ok(Self::A2),
            "A1" => Ok(Self::A1),
            other => Err(MarketError::Validation(format!("unknown print size: {other}"))),
        }
    }
}

/// Catalog artwork as seen by the order subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Artwork {
    /// Catalog identifier.
    pub id: ArtworkId,
    /// Display title, snapshotted onto order lines.
    pub title: String,
    /// Artist who fulfils orders for this work, if known.
    pub artist_id: Option<UserId>,
    /// Current sale price.
    pub price: Decimal,
    /// Whether the original is still available.
    pub in_stock: bool,
    /// Last catalog update.
    pub updated_at: DateTime<Utc>,
}

impl Artwork {
    /// Returns `true` if a line of `item_type` may currently be sold.
    #[must_use]
    pub const fn available_as(&self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::Original => self.in_stock,
            ItemType::Print => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn artwork(in_stock: bool) -> Artwork {
        Artwork {
            id: ArtworkId::new(),
            title: "Quiet Field".to_string(),
            artist_id: None,
            price: dec!(10000),
            in_stock,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn prints_ignore_stock_flag() {
        let sold = artwork(false);
        assert!(!sold.available_as(ItemType::Original));
        assert!(sold.available_as(ItemType::Print));
    }

    #[test]
    fn original_line_rules() {
        assert!(ItemType::Original.validate_line(1, None).is_ok());
        assert!(ItemType::Original.validate_line(2, None).is_err());
        assert!(ItemType::Original.validate_line(1, Some(PrintSize::A4)).is_err());
    }

    #[test]
    fn print_line_rules() {
        assert!(ItemType::Print.validate_line(3, Some(PrintSize::A3)).is_ok());
        assert!(ItemType::Print.validate_line(3, None).is_err());
        assert!(ItemType::Print.validate_line(0, Some(PrintSize::A3)).is_err());
        assert!(
            ItemType::Print
                .validate_line(MAX_LINE_QUANTITY + 1, Some(PrintSize::A3))
                .is_err()
        );
    }

    #[test]
    fn storage_strings_parse_back() {
        for t in [ItemType::Original, ItemType::Print] {
            assert!(matches!(t.as_str().parse::<ItemType>(), Ok(p) if p == t));
        }
        assert!(matches!("a2".parse::<PrintSize>(), Ok(PrintSize::A2)));
    }
}

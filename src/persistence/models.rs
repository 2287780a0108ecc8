//! Database row models and their conversion into domain types.
//!
//! Enumerations are stored as `TEXT` using the domain types' `as_str`
//! forms; a row that fails to parse surfaces as
//! [`MarketError::Persistence`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::order::PaymentChannel;
use crate::domain::{
    Artwork, CartItem, GiftCard, ItemType, Order, OrderItem, OrderStatus, Owner, PaymentMethod,
    PrintSize, ShippingInfo,
};
use crate::error::MarketError;

/// Converts a storage-level parse failure into a persistence error.
fn corrupt(column: &str, err: impl std::fmt::Display) -> MarketError {
    MarketError::Persistence(format!("corrupt {column} column: {err}"))
}

fn quantity(raw: i32) -> Result<u32, MarketError> {
    u32::try_from(raw).map_err(|e| corrupt("quantity", e))
}

fn print_size(raw: Option<&str>) -> Result<Option<PrintSize>, MarketError> {
    raw.map(str::parse::<PrintSize>)
        .transpose()
        .map_err(|e| corrupt("print_size", e))
}

/// A row of the `artworks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtworkRow {
    /// Primary key.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Fulfilling artist.
    pub artist_id: Option<Uuid>,
    /// Current price.
    pub price: Decimal,
    /// Original still available.
    pub in_stock: bool,
    /// Last catalog update.
    pub updated_at: DateTime<Utc>,
}

impl From<ArtworkRow> for Artwork {
    fn from(row: ArtworkRow) -> Self {
        Self {
            id: row.id.into(),
            title: row.title,
            artist_id: row.artist_id.map(Into::into),
            price: row.price,
            in_stock: row.in_stock,
            updated_at: row.updated_at,
        }
    }
}

/// A row of the `cart_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    /// Primary key.
    pub id: Uuid,
    /// Owner in `user:<uuid>` / `guest:<session>` form.
    pub owner: String,
    /// Referenced artwork.
    pub artwork_id: Uuid,
    /// `ORIGINAL` or `PRINT`.
    pub item_type: String,
    /// Print size, null for originals.
    pub print_size: Option<String>,
    /// Quantity.
    pub quantity: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = MarketError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            owner: row.owner.parse::<Owner>().map_err(|e| corrupt("owner", e))?,
            artwork_id: row.artwork_id.into(),
            item_type: row
                .item_type
                .parse::<ItemType>()
                .map_err(|e| corrupt("item_type", e))?,
            print_size: print_size(row.print_size.as_deref())?,
            quantity: quantity(row.quantity)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `orders` table (items are loaded separately).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    /// Primary key.
    pub id: Uuid,
    /// Owner in string form.
    pub owner: String,
    /// Shipping snapshot.
    pub shipping: Json<ShippingInfo>,
    /// Payment method.
    pub payment_method: String,
    /// Snapshot total.
    pub total_amount: Decimal,
    /// Gift card applied at checkout.
    pub gift_card_code: Option<String>,
    /// Gift card debit.
    pub gift_card_amount: Decimal,
    /// Current status.
    pub status: String,
    /// Payment confirmation channel.
    pub payment_channel: Option<String>,
    /// Payment reference.
    pub payment_reference: Option<String>,
    /// Tracking number.
    pub tracking_number: Option<String>,
    /// Carrier.
    pub carrier: Option<String>,
    /// Operator notes.
    pub admin_notes: Option<String>,
    /// Cancellation reason.
    pub cancel_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// `PAID` time.
    pub paid_at: Option<DateTime<Utc>>,
    /// `AWAITING_CONFIRMATION` time.
    pub artist_notified_at: Option<DateTime<Utc>>,
    /// Artist confirmation time.
    pub artist_confirmed_at: Option<DateTime<Utc>>,
    /// Admin confirmation time.
    pub admin_confirmed_at: Option<DateTime<Utc>>,
    /// `SHIPPED` time.
    pub shipped_at: Option<DateTime<Utc>>,
    /// `DELIVERED` time.
    pub delivered_at: Option<DateTime<Utc>>,
    /// `CANCELLED` time.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

/// A row of the `order_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    /// Parent order.
    pub order_id: Uuid,
    /// Line position within the order.
    pub position: i32,
    /// Referenced artwork.
    pub artwork_id: Uuid,
    /// Title snapshot.
    pub title: String,
    /// Artist snapshot.
    pub artist_id: Option<Uuid>,
    /// `ORIGINAL` or `PRINT`.
    pub item_type: String,
    /// Print size.
    pub print_size: Option<String>,
    /// Quantity.
    pub quantity: i32,
    /// Unit price snapshot.
    pub price_at_purchase: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = MarketError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            artwork_id: row.artwork_id.into(),
            title: row.title,
            artist_id: row.artist_id.map(Into::into),
            item_type: row
                .item_type
                .parse::<ItemType>()
                .map_err(|e| corrupt("item_type", e))?,
            print_size: print_size(row.print_size.as_deref())?,
            quantity: quantity(row.quantity)?,
            price_at_purchase: row.price_at_purchase,
        })
    }
}

impl OrderRow {
    /// Assembles the domain order from this row and its item rows.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] if a stored enum fails to parse.
    pub fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, MarketError> {
        Ok(Order {
            id: self.id.into(),
            owner: self.owner.parse::<Owner>().map_err(|e| corrupt("owner", e))?,
            shipping: self.shipping.0,
            payment_method: self
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(|e| corrupt("payment_method", e))?,
            items: items
                .into_iter()
                .map(OrderItem::try_from)
                .collect::<Result<_, _>>()?,
            total_amount: self.total_amount,
            gift_card_code: self.gift_card_code,
            gift_card_amount: self.gift_card_amount,
            status: self
                .status
                .parse::<OrderStatus>()
                .map_err(|e| corrupt("status", e))?,
            payment_channel: self
                .payment_channel
                .as_deref()
                .map(str::parse::<PaymentChannel>)
                .transpose()
                .map_err(|e| corrupt("payment_channel", e))?,
            payment_reference: self.payment_reference,
            tracking_number: self.tracking_number,
            carrier: self.carrier,
            admin_notes: self.admin_notes,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            paid_at: self.paid_at,
            artist_notified_at: self.artist_notified_at,
            artist_confirmed_at: self.artist_confirmed_at,
            admin_confirmed_at: self.admin_confirmed_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row of the `gift_cards` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GiftCardRow {
    /// Redemption code.
    pub code: String,
    /// Face amount.
    pub amount: Decimal,
    /// Remaining balance.
    pub balance: Decimal,
    /// Recipient email.
    pub recipient_email: Option<String>,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// Exhausted flag.
    pub is_redeemed: bool,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

impl From<GiftCardRow> for GiftCard {
    fn from(row: GiftCardRow) -> Self {
        Self {
            code: row.code,
            amount: row.amount,
            balance: row.balance,
            recipient_email: row.recipient_email,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            is_redeemed: row.is_redeemed,
            updated_at: row.updated_at,
        }
    }
}

//! Persistence layer: the [`MarketStore`] trait and its implementations.
//!
//! Each trait method is one atomic unit of work. Implementations must
//! either apply every write of a method or none of them:
//!
//! - [`memory::MemoryStore`] serializes all units of work behind a single
//!   `RwLock`, which makes every method trivially isolated.
//! - [`postgres::PostgresStore`] runs each mutating method inside one
//!   `sqlx` transaction using row locks (`SELECT ... FOR UPDATE`) and
//!   conditional updates checked by affected-row count.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::order::ReleasePlan;
use crate::domain::{
    Artwork, ArtworkId, CartItem, CartItemId, CartLine, CheckoutRequest, GiftCard,
    GiftCardApplication, Order, OrderFilter, OrderId, OrderStatus, Owner,
};
use crate::error::MarketError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Durable state behind the order subsystem.
#[async_trait]
pub trait MarketStore: Send + Sync + fmt::Debug {
    /// Looks up an artwork by id.
    async fn artwork(&self, id: ArtworkId) -> Result<Option<Artwork>, MarketError>;

    /// Inserts or replaces a catalog artwork.
    async fn put_artwork(&self, artwork: &Artwork) -> Result<(), MarketError>;

    /// Lists an owner's cart, oldest line first.
    async fn cart(&self, owner: &Owner) -> Result<Vec<CartItem>, MarketError>;

    /// Looks up a single cart line.
    async fn cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, MarketError>;

    /// Inserts `line` for `owner`, or folds it into the existing row with
    /// the same key (see [`CartItem::absorb`]).
    async fn upsert_cart_line(
        &self,
        owner: &Owner,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> Result<CartItem, MarketError>;

    /// Sets a line's quantity. Returns `None` if the line does not exist.
    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError>;

    /// Deletes a line. Returns `false` if it did not exist.
    async fn remove_cart_item(&self, id: CartItemId) -> Result<bool, MarketError>;

    /// Deletes every line of `owner`, returning how many were removed.
    async fn clear_cart(&self, owner: &Owner) -> Result<u64, MarketError>;

    /// Deletes line `id` and folds it into `target`'s cart in one unit of
    /// work. Returns `None` if the line was already gone.
    async fn move_cart_item(
        &self,
        id: CartItemId,
        target: &Owner,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError>;

    /// Materializes an order atomically: re-reads the artworks, checks and
    /// flips stock for originals, applies the gift card, persists the
    /// order, and clears the cart if requested.
    async fn create_order(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, MarketError>;

    /// Looks up an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>, MarketError>;

    /// Lists orders matching `filter`, newest first, with the total match
    /// count.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), MarketError>;

    /// Writes `order` only if the stored status is still `expected`, and
    /// applies `release` in the same unit of work. Returns `false` (and
    /// writes nothing) if the status has moved.
    async fn commit_transition(
        &self,
        expected: OrderStatus,
        order: &Order,
        release: &ReleasePlan,
    ) -> Result<bool, MarketError>;

    /// Replaces the admin notes. Returns `None` if the order does not exist.
    async fn set_order_notes(
        &self,
        id: OrderId,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, MarketError>;

    /// Inserts a new card. Returns `false` if the code is already taken.
    async fn insert_gift_card(&self, card: &GiftCard) -> Result<bool, MarketError>;

    /// Looks up a card by its normalized code.
    async fn gift_card(&self, code: &str) -> Result<Option<GiftCard>, MarketError>;

    /// Applies the card against `order_total` under a row lock and persists
    /// the debit.
    async fn redeem_gift_card(
        &self,
        code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<GiftCardApplication, MarketError>;
}

//! PostgreSQL implementation of [`MarketStore`].
//!
//! Every mutating method runs in one transaction. Returning early with `?`
//! drops the transaction, which rolls it back, so a failed unit of work
//! leaves nothing behind. Contended rows are guarded two ways:
//!
//! - artworks and gift cards are read with `SELECT ... FOR UPDATE`
//!   (artworks in id order, so concurrent checkouts lock in the same order);
//! - stock flips and status changes are conditional updates whose affected
//!   row count is checked.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::MarketStore;
use super::models::{ArtworkRow, CartItemRow, GiftCardRow, OrderItemRow, OrderRow};
use crate::domain::order::{self, ReleasePlan};
use crate::domain::{
    Artwork, ArtworkId, CartItem, CartItemId, CartLine, CheckoutRequest, GiftCard,
    GiftCardApplication, ItemType, Order, OrderFilter, OrderId, OrderStatus, Owner,
};
use crate::error::MarketError;

const ARTWORK_COLUMNS: &str = "id, title, artist_id, price, in_stock, updated_at";

const CART_COLUMNS: &str =
    "id, owner, artwork_id, item_type, print_size, quantity, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, owner, shipping, payment_method, total_amount, gift_card_code, \
     gift_card_amount, status, payment_channel, payment_reference, tracking_number, carrier, \
     admin_notes, cancel_reason, created_at, paid_at, artist_notified_at, artist_confirmed_at, \
     admin_confirmed_at, shipped_at, delivered_at, cancelled_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "order_id, position, artwork_id, title, artist_id, item_type, \
     print_size, quantity, price_at_purchase";

const GIFT_CARD_COLUMNS: &str =
    "code, amount, balance, recipient_email, issued_at, expires_at, is_redeemed, updated_at";

/// Inserts a cart line or folds it into the row with the same key.
/// Originals stay at quantity 1; prints sum, capped at 99.
const UPSERT_CART_SQL: &str = "INSERT INTO cart_items \
     (id, owner, artwork_id, item_type, print_size, quantity, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
     ON CONFLICT (owner, artwork_id, item_type, (COALESCE(print_size, ''))) DO UPDATE SET \
     quantity = CASE WHEN cart_items.item_type = 'ORIGINAL' THEN 1 \
                ELSE LEAST(cart_items.quantity + EXCLUDED.quantity, 99) END, \
     updated_at = EXCLUDED.updated_at \
     RETURNING id, owner, artwork_id, item_type, print_size, quantity, created_at, updated_at";

fn to_i32(value: u32) -> Result<i32, MarketError> {
    i32::try_from(value).map_err(|e| MarketError::Validation(format!("value out of range: {e}")))
}

/// PostgreSQL-backed store using a `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded SQL migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), MarketError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Persistence(e.to_string()))
    }

    async fn upsert_line(
        tx: &mut Transaction<'_, Postgres>,
        owner: &Owner,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> Result<CartItem, MarketError> {
        let row = sqlx::query_as::<_, CartItemRow>(UPSERT_CART_SQL)
            .bind(Uuid::new_v4())
            .bind(owner.to_string())
            .bind(line.artwork_id.as_uuid())
            .bind(line.item_type.as_str())
            .bind(line.print_size.map(|s| s.as_str()))
            .bind(to_i32(line.quantity)?)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        CartItem::try_from(row)
    }

    async fn lock_gift_card(
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<Option<GiftCard>, MarketError> {
        let row = sqlx::query_as::<_, GiftCardRow>(&format!(
            "SELECT {GIFT_CARD_COLUMNS} FROM gift_cards WHERE code = $1 FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(GiftCard::from))
    }

    async fn save_gift_card_balance(
        tx: &mut Transaction<'_, Postgres>,
        card: &GiftCard,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE gift_cards SET balance = $2, is_redeemed = $3, updated_at = $4 WHERE code = $1",
        )
        .bind(&card.code)
        .bind(card.balance)
        .bind(card.is_redeemed)
        .bind(card.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn redeem_in(
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<GiftCardApplication, MarketError> {
        let mut card = Self::lock_gift_card(tx, code)
            .await?
            .ok_or_else(|| MarketError::not_found("gift card", code))?;
        let application = card.apply(order_total, now)?;
        Self::save_gift_card_balance(tx, &card).await?;
        Ok(application)
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItemRow>>, MarketError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) \
             ORDER BY order_id, position"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, MarketError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = self.load_items(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn artwork(&self, id: ArtworkId) -> Result<Option<Artwork>, MarketError> {
        let row = sqlx::query_as::<_, ArtworkRow>(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Artwork::from))
    }

    async fn put_artwork(&self, artwork: &Artwork) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO artworks (id, title, artist_id, price, in_stock, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, \
             artist_id = EXCLUDED.artist_id, price = EXCLUDED.price, \
             in_stock = EXCLUDED.in_stock, updated_at = EXCLUDED.updated_at",
        )
        .bind(artwork.id.as_uuid())
        .bind(&artwork.title)
        .bind(artwork.artist_id.map(Uuid::from))
        .bind(artwork.price)
        .bind(artwork.in_stock)
        .bind(artwork.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cart(&self, owner: &Owner) -> Result<Vec<CartItem>, MarketError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE owner = $1 ORDER BY created_at, id"
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CartItem::try_from).collect()
    }

    async fn cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, MarketError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(CartItem::try_from).transpose()
    }

    async fn upsert_cart_line(
        &self,
        owner: &Owner,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> Result<CartItem, MarketError> {
        let mut tx = self.pool.begin().await?;
        let item = Self::upsert_line(&mut tx, owner, line, now).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "UPDATE cart_items SET quantity = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {CART_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(to_i32(quantity)?)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CartItem::try_from).transpose()
    }

    async fn remove_cart_item(&self, id: CartItemId) -> Result<bool, MarketError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, owner: &Owner) -> Result<u64, MarketError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner = $1")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn move_cart_item(
        &self,
        id: CartItemId,
        target: &Owner,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let source = sqlx::query_as::<_, CartItemRow>(&format!(
            "DELETE FROM cart_items WHERE id = $1 RETURNING {CART_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(source) = source else {
            return Ok(None);
        };
        let source = CartItem::try_from(source)?;
        let merged = Self::upsert_line(&mut tx, target, &source.as_line(), now).await?;
        tx.commit().await?;
        Ok(Some(merged))
    }

    async fn create_order(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, MarketError> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = request.artwork_ids().into_iter().map(Uuid::from).collect();
        let artworks: HashMap<ArtworkId, Artwork> = sqlx::query_as::<_, ArtworkRow>(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| (ArtworkId::from(row.id), Artwork::from(row)))
        .collect();

        let mut order = order::materialize(request, &artworks, now)?;

        if let Some(code) = &request.gift_card_code {
            let application = Self::redeem_in(&mut tx, code, order.total_amount, now).await?;
            order.record_gift_card(&application);
        }

        sqlx::query(
            "INSERT INTO orders (id, owner, shipping, payment_method, total_amount, \
             gift_card_code, gift_card_amount, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)",
        )
        .bind(order.id.as_uuid())
        .bind(order.owner.to_string())
        .bind(Json(&order.shipping))
        .bind(order.payment_method.as_str())
        .bind(order.total_amount)
        .bind(order.gift_card_code.as_deref())
        .bind(order.gift_card_amount)
        .bind(order.status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|e| MarketError::Validation(format!("too many items: {e}")))?;
            sqlx::query(
                "INSERT INTO order_items (order_id, position, artwork_id, title, artist_id, \
                 item_type, print_size, quantity, price_at_purchase) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(order.id.as_uuid())
            .bind(position)
            .bind(item.artwork_id.as_uuid())
            .bind(&item.title)
            .bind(item.artist_id.map(Uuid::from))
            .bind(item.item_type.as_str())
            .bind(item.print_size.map(|s| s.as_str()))
            .bind(to_i32(item.quantity)?)
            .bind(item.price_at_purchase)
            .execute(&mut *tx)
            .await?;
        }

        let originals: Vec<Uuid> = order.originals().map(Uuid::from).collect();
        if !originals.is_empty() {
            let flipped: Vec<Uuid> = sqlx::query_scalar(
                "UPDATE artworks SET in_stock = FALSE, updated_at = $2 \
                 WHERE id = ANY($1) AND in_stock RETURNING id",
            )
            .bind(&originals)
            .bind(now)
            .fetch_all(&mut *tx)
            .await?;
            if let Some(sold) = order.items.iter().find(|item| {
                item.item_type == ItemType::Original && !flipped.contains(item.artwork_id.as_uuid())
            }) {
                return Err(MarketError::OutOfStock(sold.title.clone()));
            }
        }

        if request.clear_cart {
            sqlx::query("DELETE FROM cart_items WHERE owner = $1")
                .bind(request.owner.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(order_id = %order.id, "order row committed");
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, MarketError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.assemble(vec![row]).await?.into_iter().next())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), MarketError> {
        let status = filter.status.map(OrderStatus::as_str);
        let owner = filter.owner.as_ref().map(Owner::to_string);
        let offset = i64::try_from(filter.offset()).unwrap_or(i64::MAX);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR owner = $2)",
        )
        .bind(status)
        .bind(owner.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR owner = $2) \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(owner.as_deref())
        .bind(i64::from(filter.per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let orders = self.assemble(rows).await?;
        Ok((orders, u64::try_from(total).unwrap_or_default()))
    }

    async fn commit_transition(
        &self,
        expected: OrderStatus,
        order: &Order,
        release: &ReleasePlan,
    ) -> Result<bool, MarketError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET status = $3, payment_channel = $4, payment_reference = $5, \
             tracking_number = $6, carrier = $7, admin_notes = $8, cancel_reason = $9, \
             paid_at = $10, artist_notified_at = $11, artist_confirmed_at = $12, \
             admin_confirmed_at = $13, shipped_at = $14, delivered_at = $15, \
             cancelled_at = $16, updated_at = $17 \
             WHERE id = $1 AND status = $2",
        )
        .bind(order.id.as_uuid())
        .bind(expected.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_channel.map(|c| c.as_str()))
        .bind(order.payment_reference.as_deref())
        .bind(order.tracking_number.as_deref())
        .bind(order.carrier.as_deref())
        .bind(order.admin_notes.as_deref())
        .bind(order.cancel_reason.as_deref())
        .bind(order.paid_at)
        .bind(order.artist_notified_at)
        .bind(order.artist_confirmed_at)
        .bind(order.admin_confirmed_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        if !release.originals.is_empty() {
            let ids: Vec<Uuid> = release.originals.iter().copied().map(Uuid::from).collect();
            sqlx::query("UPDATE artworks SET in_stock = TRUE, updated_at = $2 WHERE id = ANY($1)")
                .bind(&ids)
                .bind(order.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(credit) = &release.gift_card_credit
            && let Some(mut card) = Self::lock_gift_card(&mut tx, &credit.code).await?
        {
            card.credit(credit.amount, order.updated_at);
            Self::save_gift_card_balance(&mut tx, &card).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn set_order_notes(
        &self,
        id: OrderId,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, MarketError> {
        let updated = sqlx::query("UPDATE orders SET admin_notes = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(notes)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.order(id).await
    }

    async fn insert_gift_card(&self, card: &GiftCard) -> Result<bool, MarketError> {
        let inserted = sqlx::query(
            "INSERT INTO gift_cards (code, amount, balance, recipient_email, issued_at, \
             expires_at, is_redeemed, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(&card.code)
        .bind(card.amount)
        .bind(card.balance)
        .bind(card.recipient_email.as_deref())
        .bind(card.issued_at)
        .bind(card.expires_at)
        .bind(card.is_redeemed)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn gift_card(&self, code: &str) -> Result<Option<GiftCard>, MarketError> {
        let row = sqlx::query_as::<_, GiftCardRow>(&format!(
            "SELECT {GIFT_CARD_COLUMNS} FROM gift_cards WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(GiftCard::from))
    }

    async fn redeem_gift_card(
        &self,
        code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<GiftCardApplication, MarketError> {
        let mut tx = self.pool.begin().await?;
        let application = Self::redeem_in(&mut tx, code, order_total, now).await?;
        tx.commit().await?;
        Ok(application)
    }
}

//! In-memory store used for development and tests.
//!
//! All state lives in one [`tokio::sync::RwLock`]. Every mutating method
//! holds the write lock for its whole unit of work and performs all
//! fallible checks before the first write, so a failed call leaves no
//! trace and concurrent calls are fully serialized.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::MarketStore;
use crate::domain::order::{self, ReleasePlan};
use crate::domain::{
    Artwork, ArtworkId, CartItem, CartItemId, CartLine, CheckoutRequest, GiftCard,
    GiftCardApplication, Order, OrderFilter, OrderId, OrderStatus, Owner,
};
use crate::error::MarketError;

#[derive(Debug, Default)]
struct State {
    artworks: HashMap<ArtworkId, Artwork>,
    cart: HashMap<CartItemId, CartItem>,
    orders: HashMap<OrderId, Order>,
    gift_cards: HashMap<String, GiftCard>,
}

impl State {
    fn upsert_line(&mut self, owner: &Owner, line: &CartLine, now: DateTime<Utc>) -> CartItem {
        let key = line.key(owner);
        if let Some(existing) = self.cart.values_mut().find(|item| item.key() == key) {
            existing.absorb(line.quantity, now);
            return existing.clone();
        }
        let item = CartItem::new(owner.clone(), line, now);
        self.cart.insert(item.id, item.clone());
        item
    }
}

/// Process-local [`MarketStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn artwork(&self, id: ArtworkId) -> Result<Option<Artwork>, MarketError> {
        Ok(self.state.read().await.artworks.get(&id).cloned())
    }

    async fn put_artwork(&self, artwork: &Artwork) -> Result<(), MarketError> {
        self.state
            .write()
            .await
            .artworks
            .insert(artwork.id, artwork.clone());
        Ok(())
    }

    async fn cart(&self, owner: &Owner) -> Result<Vec<CartItem>, MarketError> {
        let state = self.state.read().await;
        let mut items: Vec<CartItem> = state
            .cart
            .values()
            .filter(|item| &item.owner == owner)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id));
        Ok(items)
    }

    async fn cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, MarketError> {
        Ok(self.state.read().await.cart.get(&id).cloned())
    }

    async fn upsert_cart_line(
        &self,
        owner: &Owner,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> Result<CartItem, MarketError> {
        Ok(self.state.write().await.upsert_line(owner, line, now))
    }

    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError> {
        let mut state = self.state.write().await;
        Ok(state.cart.get_mut(&id).map(|item| {
            item.quantity = quantity;
            item.updated_at = now;
            item.clone()
        }))
    }

    async fn remove_cart_item(&self, id: CartItemId) -> Result<bool, MarketError> {
        Ok(self.state.write().await.cart.remove(&id).is_some())
    }

    async fn clear_cart(&self, owner: &Owner) -> Result<u64, MarketError> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state.cart.retain(|_, item| &item.owner != owner);
        Ok((before - state.cart.len()) as u64)
    }

    async fn move_cart_item(
        &self,
        id: CartItemId,
        target: &Owner,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, MarketError> {
        let mut state = self.state.write().await;
        let Some(source) = state.cart.remove(&id) else {
            return Ok(None);
        };
        Ok(Some(state.upsert_line(target, &source.as_line(), now)))
    }

    async fn create_order(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, MarketError> {
        let mut state = self.state.write().await;

        let artworks: HashMap<ArtworkId, Artwork> = request
            .artwork_ids()
            .into_iter()
            .filter_map(|id| state.artworks.get(&id).map(|a| (id, a.clone())))
            .collect();
        let mut order = order::materialize(request, &artworks, now)?;

        let card = match &request.gift_card_code {
            Some(code) => {
                let mut card = state
                    .gift_cards
                    .get(code)
                    .cloned()
                    .ok_or_else(|| MarketError::not_found("gift card", code))?;
                let application = card.apply(order.total_amount, now)?;
                order.record_gift_card(&application);
                Some(card)
            }
            None => None,
        };

        // Nothing below can fail.
        for id in order.originals() {
            if let Some(artwork) = state.artworks.get_mut(&id) {
                artwork.in_stock = false;
                artwork.updated_at = now;
            }
        }
        if let Some(card) = card {
            state.gift_cards.insert(card.code.clone(), card);
        }
        if request.clear_cart {
            state.cart.retain(|_, item| item.owner != request.owner);
        }
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, MarketError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<Order>, u64), MarketError> {
        let state = self.state.read().await;
        let mut matched: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = matched.len() as u64;
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let page = matched
            .into_iter()
            .skip(offset)
            .take(filter.per_page as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn commit_transition(
        &self,
        expected: OrderStatus,
        order: &Order,
        release: &ReleasePlan,
    ) -> Result<bool, MarketError> {
        let mut state = self.state.write().await;
        let current = state
            .orders
            .get(&order.id)
            .ok_or_else(|| MarketError::not_found("order", order.id))?;
        if current.status != expected {
            return Ok(false);
        }

        for id in &release.originals {
            if let Some(artwork) = state.artworks.get_mut(id) {
                artwork.in_stock = true;
                artwork.updated_at = order.updated_at;
            }
        }
        if let Some(credit) = &release.gift_card_credit
            && let Some(card) = state.gift_cards.get_mut(&credit.code)
        {
            card.credit(credit.amount, order.updated_at);
        }
        state.orders.insert(order.id, order.clone());
        Ok(true)
    }

    async fn set_order_notes(
        &self,
        id: OrderId,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, MarketError> {
        let mut state = self.state.write().await;
        Ok(state.orders.get_mut(&id).map(|order| {
            order.admin_notes = notes.map(str::to_string);
            order.updated_at = now;
            order.clone()
        }))
    }

    async fn insert_gift_card(&self, card: &GiftCard) -> Result<bool, MarketError> {
        let mut state = self.state.write().await;
        if state.gift_cards.contains_key(&card.code) {
            return Ok(false);
        }
        state.gift_cards.insert(card.code.clone(), card.clone());
        Ok(true)
    }

    async fn gift_card(&self, code: &str) -> Result<Option<GiftCard>, MarketError> {
        Ok(self.state.read().await.gift_cards.get(code).cloned())
    }

    async fn redeem_gift_card(
        &self,
        code: &str,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<GiftCardApplication, MarketError> {
        let mut state = self.state.write().await;
        let card = state
            .gift_cards
            .get_mut(code)
            .ok_or_else(|| MarketError::not_found("gift card", code))?;
        card.apply(order_total, now)
    }
}

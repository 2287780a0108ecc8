//! Order service: checkout and the status state machine.
//!
//! Every status change goes through [`OrderService::apply_transition`]:
//! load, authorize, apply the pure transition, then commit with a
//! compare-and-set on the previous status. The [`OrderEvent`] is published
//! only once the store has committed.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::gift_card::normalize_code;
use crate::domain::order::{self, Confirmer, ReleasePlan};
use crate::domain::{
    CartLine, Caller, CheckoutRequest, EventBus, Order, OrderEvent, OrderFilter, OrderId,
    OrderStatus, OrderTransition, Owner, PaymentMethod, Role, ShippingInfo, TransitionKind,
};
use crate::error::MarketError;
use crate::persistence::MarketStore;

/// Checkout input as received from a caller.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Explicit lines to buy. `None` checks out the caller's cart and
    /// clears it.
    pub items: Option<Vec<CartLine>>,
    /// Shipping snapshot.
    pub shipping: ShippingInfo,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
    /// Gift card to apply against the total.
    pub gift_card_code: Option<String>,
}

/// Listing query after pagination clamping.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Only orders in this status.
    pub status: Option<OrderStatus>,
    /// Only orders of this owner. Honoured for admins only.
    pub owner: Option<Owner>,
    /// Page number (1-indexed).
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

/// Order lifecycle operations.
#[derive(Debug, Clone)]
pub struct OrderService {
    store: Arc<dyn MarketStore>,
    event_bus: EventBus,
}

impl OrderService {
    /// Creates a new `OrderService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Materializes a `PENDING` order for the caller.
    ///
    /// Runs as one unit of work in the store: artworks are re-read, every
    /// ORIGINAL is checked and flipped out of stock, the gift card (if
    /// any) is debited, the order is written and the cart cleared. Any
    /// failure leaves none of these effects behind.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] for an empty cart/item list or bad
    ///   shipping info.
    /// - [`MarketError::NotFound`] for an unknown artwork or gift card.
    /// - [`MarketError::OutOfStock`] if an ORIGINAL is already sold.
    /// - [`MarketError::Expired`] / [`MarketError::FullyRedeemed`] for an
    ///   unusable gift card.
    pub async fn create_order(&self, caller: &Caller, input: PlaceOrder) -> Result<Order, MarketError> {
        let (lines, clear_cart) = match input.items {
            Some(items) => (items, false),
            None => {
                let cart = self.store.cart(&caller.owner).await?;
                if cart.is_empty() {
                    return Err(MarketError::Validation("cart is empty".to_string()));
                }
                (cart.iter().map(|item| item.as_line()).collect(), true)
            }
        };

        let request = CheckoutRequest {
            owner: caller.owner.clone(),
            lines,
            shipping: input.shipping,
            payment_method: input.payment_method,
            gift_card_code: input
                .gift_card_code
                .as_deref()
                .map(normalize_code)
                .filter(|code| !code.is_empty()),
            clear_cart,
        };
        request.validate()?;

        let order = self.store.create_order(&request, Utc::now()).await?;

        tracing::info!(
            order_id = %order.id,
            owner = %order.owner,
            total = %order.total_amount,
            amount_due = %order.amount_due(),
            items = order.items.len(),
            "order placed"
        );
        self.event_bus.publish(OrderEvent::OrderPlaced {
            order_id: order.id,
            total_amount: order.total_amount,
            amount_due: order.amount_due(),
            timestamp: order.created_at,
        });
        Ok(order)
    }

    /// Loads an order without authorization.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the order does not exist.
    pub async fn load(&self, id: OrderId) -> Result<Order, MarketError> {
        self.store
            .order(id)
            .await?
            .ok_or_else(|| MarketError::not_found("order", id))
    }

    /// Returns an order the caller owns (or any order, for admins).
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] or [`MarketError::Forbidden`].
    pub async fn get_order(&self, caller: &Caller, id: OrderId) -> Result<Order, MarketError> {
        let order = self.load(id).await?;
        caller.require_owner_or_admin(&order.owner)?;
        Ok(order)
    }

    /// Lists orders newest first. Non-admin callers only ever see their own.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Persistence`] on storage failure.
    pub async fn list_orders(
        &self,
        caller: &Caller,
        query: OrderQuery,
    ) -> Result<(Vec<Order>, u64), MarketError> {
        let owner = if caller.is_admin() {
            query.owner
        } else {
            Some(caller.owner.clone())
        };
        let filter = OrderFilter {
            status: query.status,
            owner,
            page: query.page.max(1),
            per_page: query.per_page.max(1),
        };
        self.store.list_orders(&filter).await
    }

    /// `PAID → AWAITING_CONFIRMATION`. Admin only.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`] or
    /// [`MarketError::InvalidTransition`].
    pub async fn request_confirmation(&self, caller: &Caller, id: OrderId) -> Result<Order, MarketError> {
        caller.require_admin()?;
        let order = self.load(id).await?;
        self.apply_transition(order, &OrderTransition::RequestConfirmation)
            .await
    }

    /// `AWAITING_CONFIRMATION → CONFIRMED`.
    ///
    /// Admins confirm on the artist's behalf; an artist may confirm an
    /// order that contains one of their works.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`] or
    /// [`MarketError::InvalidTransition`].
    pub async fn confirm(&self, caller: &Caller, id: OrderId) -> Result<Order, MarketError> {
        let order = self.load(id).await?;
        let by = if caller.is_admin() {
            Confirmer::Admin
        } else if let Some(user) = caller.owner.user_id()
            && caller.role == Role::Artist
            && order.artist_ids().contains(&user)
        {
            Confirmer::Artist
        } else {
            return Err(MarketError::Forbidden(
                "only an admin or the fulfilling artist can confirm".to_string(),
            ));
        };
        self.apply_transition(order, &OrderTransition::Confirm { by })
            .await
    }

    /// `CONFIRMED → SHIPPED`. Admin only; the tracking number is required.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`],
    /// [`MarketError::Validation`] or [`MarketError::InvalidTransition`].
    pub async fn ship(
        &self,
        caller: &Caller,
        id: OrderId,
        tracking_number: String,
        carrier: Option<String>,
        notes: Option<String>,
    ) -> Result<Order, MarketError> {
        caller.require_admin()?;
        let order = self.load(id).await?;
        self.apply_transition(
            order,
            &OrderTransition::Ship {
                tracking_number,
                carrier,
                notes,
            },
        )
        .await
    }

    /// `SHIPPED → DELIVERED`. Admin only.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`] or
    /// [`MarketError::InvalidTransition`].
    pub async fn deliver(&self, caller: &Caller, id: OrderId) -> Result<Order, MarketError> {
        caller.require_admin()?;
        let order = self.load(id).await?;
        self.apply_transition(order, &OrderTransition::Deliver).await
    }

    /// Any non-terminal status `→ CANCELLED`, by the owner or an admin.
    ///
    /// Originals go back in stock and the gift card debit is credited back
    /// in the same unit of work as the status change.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`] or
    /// [`MarketError::InvalidTransition`] (from `DELIVERED`/`CANCELLED`).
    pub async fn cancel(
        &self,
        caller: &Caller,
        id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, MarketError> {
        let order = self.load(id).await?;
        caller.require_owner_or_admin(&order.owner)?;
        self.apply_transition(order, &OrderTransition::Cancel { reason })
            .await
    }

    /// Replaces the operator notes. Admin only.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`] or
    /// [`MarketError::Validation`] for oversized text.
    pub async fn set_notes(
        &self,
        caller: &Caller,
        id: OrderId,
        notes: Option<String>,
    ) -> Result<Order, MarketError> {
        caller.require_admin()?;
        let notes = notes.filter(|n| !n.trim().is_empty());
        order::check_text("notes", notes.as_deref())?;
        self.store
            .set_order_notes(id, notes.as_deref(), Utc::now())
            .await?
            .ok_or_else(|| MarketError::not_found("order", id))
    }

    /// Applies `transition` to `order` and commits it if the stored status
    /// is still the one `order` was loaded with.
    ///
    /// Callers are responsible for authorization.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidTransition`] if the transition is not
    /// in the table, or if the order moved to another status concurrently
    /// (reported from that newer status).
    pub async fn apply_transition(
        &self,
        mut order: Order,
        transition: &OrderTransition,
    ) -> Result<Order, MarketError> {
        let from = order.status;
        let event = transition.kind();
        order.apply(transition, Utc::now())?;

        let release = if event == TransitionKind::Cancel {
            order.release_plan()
        } else {
            ReleasePlan::default()
        };

        if !self.store.commit_transition(from, &order, &release).await? {
            let current = self
                .store
                .order(order.id)
                .await?
                .map_or(from, |stored| stored.status);
            tracing::debug!(order_id = %order.id, expected = %from, %current, "lost status race");
            return Err(MarketError::InvalidTransition {
                from: current,
                event,
            });
        }

        tracing::info!(
            order_id = %order.id,
            from = %from,
            to = %order.status,
            released_originals = release.originals.len(),
            "order transitioned"
        );
        self.event_bus
            .publish(OrderEvent::for_transition(&order, transition));
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::order::tests::shipping;
    use crate::domain::order::PaymentChannel;
    use crate::domain::{Artwork, ArtworkId, GiftCard, ItemType, PrintSize, UserId};
    use crate::persistence::MemoryStore;

    struct Fixture {
        service: OrderService,
        store: Arc<MemoryStore>,
        artist: UserId,
        original: Artwork,
        print: Artwork,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let artist = UserId::new();
        let original = Artwork {
            id: ArtworkId::new(),
            title: "Harbour at Dusk".to_string(),
            artist_id: Some(artist),
            price: dec!(10000),
            in_stock: true,
            updated_at: Utc::now(),
        };
        let print = Artwork {
            id: ArtworkId::new(),
            title: "Field Study".to_string(),
            artist_id: None,
            price: dec!(1500),
            in_stock: false,
            updated_at: Utc::now(),
        };
        assert_ok!(store.put_artwork(&original).await);
        assert_ok!(store.put_artwork(&print).await);
        let service = OrderService::new(Arc::clone(&store) as Arc<dyn MarketStore>, EventBus::new(64));
        Fixture {
            service,
            store,
            artist,
            original,
            print,
        }
    }

    fn place(items: Vec<CartLine>) -> PlaceOrder {
        PlaceOrder {
            items: Some(items),
            shipping: shipping(),
            payment_method: PaymentMethod::Card,
            gift_card_code: None,
        }
    }

    fn original_line(id: ArtworkId) -> CartLine {
        CartLine {
            artwork_id: id,
            quantity: 1,
            item_type: ItemType::Original,
            print_size: None,
        }
    }

    fn print_line(id: ArtworkId, quantity: u32) -> CartLine {
        CartLine {
            artwork_id: id,
            quantity,
            item_type: ItemType::Print,
            print_size: Some(PrintSize::A2),
        }
    }

    async fn paid(f: &Fixture, order: Order) -> Order {
        assert_ok!(
            f.service
                .apply_transition(
                    order,
                    &OrderTransition::ConfirmPayment {
                        channel: PaymentChannel::Manual,
                        reference: None,
                    },
                )
                .await
        )
    }

    #[tokio::test]
    async fn checkout_from_cart_clears_it() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);
        assert_ok!(
            f.store
                .upsert_cart_line(&buyer.owner, &original_line(f.original.id), Utc::now())
                .await
        );

        let input = PlaceOrder {
            items: None,
            ..place(vec![])
        };
        let order = assert_ok!(f.service.create_order(&buyer, input).await);
        assert_eq!(order.total_amount, dec!(10000));
        assert!(assert_ok!(f.store.cart(&buyer.owner).await).is_empty());

        let empty = f
            .service
            .create_order(
                &buyer,
                PlaceOrder {
                    items: None,
                    ..place(vec![])
                },
            )
            .await;
        assert!(matches!(empty, Err(MarketError::Validation(_))));
    }

    #[tokio::test]
    async fn cancel_releases_originals_only() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);

        let order = assert_ok!(
            f.service
                .create_order(&buyer, place(vec![original_line(f.original.id)]))
                .await
        );
        let sold = assert_ok!(f.store.artwork(f.original.id).await);
        assert!(sold.is_some_and(|a| !a.in_stock));

        let cancelled = assert_ok!(f.service.cancel(&buyer, order.id, Some("changed mind".into())).await);
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let restocked = assert_ok!(f.store.artwork(f.original.id).await);
        assert!(restocked.is_some_and(|a| a.in_stock));

        // Prints never touch stock flags.
        let order = assert_ok!(
            f.service
                .create_order(&buyer, place(vec![print_line(f.print.id, 2)]))
                .await
        );
        assert_ok!(f.service.cancel(&buyer, order.id, None).await);
        let print = assert_ok!(f.store.artwork(f.print.id).await);
        assert!(print.is_some_and(|a| !a.in_stock));
    }

    #[tokio::test]
    async fn price_change_never_alters_placed_order() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);
        let order = assert_ok!(
            f.service
                .create_order(&buyer, place(vec![print_line(f.print.id, 2)]))
                .await
        );

        let mut repriced = f.print.clone();
        repriced.price = dec!(99999);
        assert_ok!(f.store.put_artwork(&repriced).await);

        let reread = assert_ok!(f.service.get_order(&buyer, order.id).await);
        assert_eq!(reread.total_amount, dec!(3000));
        assert_eq!(reread.items_total(), dec!(3000));
    }

    #[tokio::test]
    async fn status_advancement_is_admin_only() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);
        let admin = Caller::user(UserId::new(), Role::Admin);
        let order = assert_ok!(
            f.service
                .create_order(&buyer, place(vec![original_line(f.original.id)]))
                .await
        );
        let order = paid(&f, order).await;

        let denied = f.service.request_confirmation(&buyer, order.id).await;
        assert!(matches!(denied, Err(MarketError::Forbidden(_))));
        assert_ok!(f.service.request_confirmation(&admin, order.id).await);

        // A different artist cannot confirm; the fulfilling one can.
        let stranger = Caller::user(UserId::new(), Role::Artist);
        assert!(matches!(
            f.service.confirm(&stranger, order.id).await,
            Err(MarketError::Forbidden(_))
        ));
        let artist = Caller::user(f.artist, Role::Artist);
        let confirmed = assert_ok!(f.service.confirm(&artist, order.id).await);
        assert!(confirmed.artist_confirmed_at.is_some());

        let blank = f.service.ship(&admin, order.id, " ".into(), None, None).await;
        assert!(matches!(blank, Err(MarketError::Validation(_))));
        let shipped = assert_ok!(
            f.service
                .ship(&admin, order.id, "TRK123".into(), Some("CJ".into()), None)
                .await
        );
        assert_eq!(shipped.tracking_number.as_deref(), Some("TRK123"));
    }

    #[tokio::test]
    async fn stale_transition_reports_current_status() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);
        let order = assert_ok!(
            f.service
                .create_order(&buyer, place(vec![original_line(f.original.id)]))
                .await
        );
        let stale = order.clone();
        assert_ok!(f.service.cancel(&buyer, order.id, None).await);

        let result = f
            .service
            .apply_transition(
                stale,
                &OrderTransition::ConfirmPayment {
                    channel: PaymentChannel::Gateway,
                    reference: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(MarketError::InvalidTransition {
                from: OrderStatus::Cancelled,
                event: TransitionKind::ConfirmPayment
            })
        ));
    }

    #[tokio::test]
    async fn gift_card_is_applied_and_credited_back_on_cancel() {
        let f = fixture().await;
        let buyer = Caller::user(UserId::new(), Role::Customer);
        let now = Utc::now();
        let card = assert_ok!(GiftCard::issue(
            "GC-TEST-CARD-0001".into(),
            dec!(4000),
            None,
            chrono::Duration::days(30),
            now
        ));
        assert_ok!(f.store.insert_gift_card(&card).await);

        let input = PlaceOrder {
            gift_card_code: Some(" gc-test-card-0001 ".into()),
            ..place(vec![original_line(f.original.id)])
        };
        let order = assert_ok!(f.service.create_order(&buyer, input).await);
        assert_eq!(order.total_amount, dec!(10000));
        assert_eq!(order.gift_card_amount, dec!(4000));
        assert_eq!(order.amount_due(), dec!(6000));
        let drained = assert_ok!(f.store.gift_card("GC-TEST-CARD-0001").await);
        assert!(drained.is_some_and(|c| c.balance == Decimal::ZERO && c.is_redeemed));

        assert_ok!(f.service.cancel(&buyer, order.id, None).await);
        let restored = assert_ok!(f.store.gift_card("GC-TEST-CARD-0001").await);
        assert!(restored.is_some_and(|c| c.balance == dec!(4000) && !c.is_redeemed));
    }

    #[tokio::test]
    async fn customers_only_list_their_own_orders() {
        let f = fixture().await;
        let alice = Caller::user(UserId::new(), Role::Customer);
        let bob = Caller::user(UserId::new(), Role::Customer);
        let admin = Caller::user(UserId::new(), Role::Admin);
        assert_ok!(f.service.create_order(&alice, place(vec![print_line(f.print.id, 1)])).await);
        assert_ok!(f.service.create_order(&bob, place(vec![print_line(f.print.id, 1)])).await);

        let query = OrderQuery {
            owner: Some(bob.owner.clone()),
            page: 1,
            per_page: 20,
            ..OrderQuery::default()
        };
        let (mine, total) = assert_ok!(f.service.list_orders(&alice, query.clone()).await);
        assert_eq!(total, 1);
        assert!(mine.iter().all(|o| o.owner == alice.owner));

        let (all, total) = assert_ok!(
            f.service
                .list_orders(&admin, OrderQuery { owner: None, ..query })
                .await
        );
        assert_eq!((all.len(), total), (2, 2));

        let Some(bobs) = all.iter().find(|o| o.owner == bob.owner) else {
            panic!("admin listing should include bob's order");
        };
        let foreign = f.service.get_order(&alice, bobs.id).await;
        assert!(matches!(foreign, Err(MarketError::Forbidden(_))));
    }
}

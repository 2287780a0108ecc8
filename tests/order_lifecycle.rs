//! End-to-end order flows against the in-memory store.

mod common;

use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use gallery_orders::domain::{
    Caller, OrderEvent, OrderStatus, PaymentMethod, Role, TransitionKind, UserId,
};
use gallery_orders::error::MarketError;
use gallery_orders::service::{ArtworkRecord, CallbackOutcome, PlaceOrder};

use common::{Harness, OPERATORS, original, print, shipping, success_callback};

fn checkout(method: PaymentMethod, gift_card_code: Option<String>) -> PlaceOrder {
    PlaceOrder {
        items: None,
        shipping: shipping(),
        payment_method: method,
        gift_card_code,
    }
}

#[tokio::test]
async fn guest_cart_to_delivered_order() {
    let h = Harness::new();
    let artist = UserId::new();
    let artwork = h.artwork("Harbour at Dusk", dec!(10000), Some(artist)).await;
    let admin = Caller::user(UserId::new(), Role::Admin);

    // Guest fills a cart, then signs in and merges it.
    let guest = assert_ok!(Caller::guest("sess-e2e"));
    assert_ok!(h.state.cart_service.add_item(&guest, original(artwork.id)).await);
    let user = Caller::user(UserId::new(), Role::Customer);
    let merge = assert_ok!(h.state.cart_service.merge_guest_cart(&user, "sess-e2e").await);
    assert_eq!(merge.merged, 1);

    let order = assert_ok!(
        h.state
            .order_service
            .create_order(&user, checkout(PaymentMethod::Card, None))
            .await
    );
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec!(10000));
    assert!(!h.stock(artwork.id).await);
    assert!(assert_ok!(h.state.cart_service.get(&user).await).is_empty());

    // Signed gateway callback pays the order.
    let mut events = h.state.event_bus.subscribe();
    let (body, header) = success_callback(order.id, 10_000);
    let outcome = assert_ok!(h.state.payment_service.reconcile_callback(&body, Some(&header)).await);
    assert_eq!(outcome, CallbackOutcome::Applied { order_id: order.id });
    let paid = assert_ok!(h.state.order_service.get_order(&user, order.id).await);
    assert_eq!(paid.status, OrderStatus::Paid);
    assert!(paid.paid_at.is_some());
    let Ok(OrderEvent::PaymentConfirmed { order_id, .. }) = events.try_recv() else {
        panic!("expected a PaymentConfirmed event");
    };
    assert_eq!(order_id, order.id);

    // Fulfilment: admin asks, the artist confirms, admin ships and delivers.
    assert_ok!(h.state.order_service.request_confirmation(&admin, order.id).await);
    let artist_caller = Caller::user(artist, Role::Artist);
    let confirmed = assert_ok!(h.state.order_service.confirm(&artist_caller, order.id).await);
    assert!(confirmed.artist_confirmed_at.is_some());

    let shipped = assert_ok!(
        h.state
            .order_service
            .ship(&admin, order.id, "TRK123".to_string(), Some("CJ".to_string()), None)
            .await
    );
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK123"));

    let delivered = assert_ok!(h.state.order_service.deliver(&admin, order.id).await);
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let result = h.state.order_service.cancel(&user, order.id, None).await;
    assert!(matches!(
        result,
        Err(MarketError::InvalidTransition {
            from: OrderStatus::Delivered,
            event: TransitionKind::Cancel
        })
    ));
}

#[tokio::test]
async fn sold_original_cannot_be_bought_twice() {
    let h = Harness::new();
    let artwork = h.artwork("Night Harbour", dec!(10000), None).await;
    let first = Caller::user(UserId::new(), Role::Customer);
    let second = Caller::user(UserId::new(), Role::Customer);

    assert_ok!(h.state.cart_service.add_item(&first, original(artwork.id)).await);
    assert_ok!(
        h.state
            .order_service
            .create_order(&first, checkout(PaymentMethod::Card, None))
            .await
    );

    let direct = PlaceOrder {
        items: Some(vec![original(artwork.id)]),
        ..checkout(PaymentMethod::Card, None)
    };
    let result = h.state.order_service.create_order(&second, direct).await;
    assert!(matches!(result, Err(MarketError::OutOfStock(title)) if title == "Night Harbour"));
}

#[tokio::test]
async fn cancellation_releases_stock_and_gift_card() {
    let h = Harness::new();
    let artwork = h.artwork("Harbour at Dusk", dec!(10000), None).await;
    let admin = Caller::user(UserId::new(), Role::Admin);
    let buyer = Caller::user(UserId::new(), Role::Customer);

    let card = assert_ok!(h.state.gift_card_service.issue(&admin, dec!(500), None).await);
    assert_ok!(h.state.cart_service.add_item(&buyer, original(artwork.id)).await);
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(&buyer, checkout(PaymentMethod::Card, Some(card.code.clone())))
            .await
    );
    assert_eq!(order.total_amount, dec!(10000));
    assert_eq!(order.gift_card_amount, dec!(500));
    assert_eq!(order.amount_due(), dec!(9500));
    assert_eq!(assert_ok!(h.state.gift_card_service.get(&card.code).await).balance, dec!(0));

    let cancelled = assert_ok!(
        h.state
            .order_service
            .cancel(&buyer, order.id, Some("changed my mind".to_string()))
            .await
    );
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(h.stock(artwork.id).await);
    let restored = assert_ok!(h.state.gift_card_service.get(&card.code).await);
    assert_eq!(restored.balance, dec!(500));
    assert!(!restored.is_redeemed);

    // The original can be bought again.
    let again = PlaceOrder {
        items: Some(vec![original(artwork.id)]),
        ..checkout(PaymentMethod::Card, None)
    };
    assert_ok!(h.state.order_service.create_order(&buyer, again).await);
}

#[tokio::test]
async fn order_total_survives_repricing() {
    let h = Harness::new();
    let artwork = h.artwork("Harbour Prints", dec!(100), None).await;
    let admin = Caller::user(UserId::new(), Role::Admin);
    let buyer = Caller::user(UserId::new(), Role::Customer);

    assert_ok!(h.state.cart_service.add_item(&buyer, print(artwork.id, 2)).await);
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(&buyer, checkout(PaymentMethod::BankTransfer, None))
            .await
    );
    assert_eq!(order.total_amount, dec!(200));

    assert_ok!(
        h.state
            .catalog_service
            .put(
                &admin,
                artwork.id,
                ArtworkRecord {
                    title: artwork.title.clone(),
                    artist_id: None,
                    price: dec!(999),
                    in_stock: true,
                },
            )
            .await
    );

    let reloaded = assert_ok!(h.state.order_service.get_order(&buyer, order.id).await);
    assert_eq!(reloaded.total_amount, dec!(200));
    let Some(line) = reloaded.items.first() else {
        panic!("order lost its line");
    };
    assert_eq!(line.price_at_purchase, dec!(100));
}

#[tokio::test]
async fn gift_card_covering_the_total_is_confirmed_manually() {
    let h = Harness::new();
    let artwork = h.artwork("Small Study", dec!(300), None).await;
    let admin = Caller::user(UserId::new(), Role::Admin);
    let buyer = Caller::user(UserId::new(), Role::Customer);

    let card = assert_ok!(h.state.gift_card_service.issue(&admin, dec!(500), None).await);
    assert_ok!(h.state.cart_service.add_item(&buyer, original(artwork.id)).await);
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(&buyer, checkout(PaymentMethod::Card, Some(card.code.clone())))
            .await
    );
    assert_eq!(order.gift_card_amount, dec!(300));
    assert!(order.amount_due().is_zero());
    assert_eq!(assert_ok!(h.state.gift_card_service.get(&card.code).await).balance, dec!(200));

    assert_err!(
        h.state
            .payment_service
            .confirm_manual_payment(&buyer, order.id, None)
            .await
    );
    let paid = assert_ok!(
        h.state
            .payment_service
            .confirm_manual_payment(&admin, order.id, Some("gift card".to_string()))
            .await
    );
    assert_eq!(paid.status, OrderStatus::Paid);
}

#[tokio::test]
async fn strangers_cannot_read_or_cancel_orders() {
    let h = Harness::new();
    let artwork = h.artwork("Harbour at Dusk", dec!(10000), None).await;
    let buyer = assert_ok!(Caller::guest("sess-owner"));
    let stranger = assert_ok!(Caller::guest("sess-other"));

    assert_ok!(h.state.cart_service.add_item(&buyer, original(artwork.id)).await);
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(&buyer, checkout(PaymentMethod::Card, None))
            .await
    );

    assert!(matches!(
        h.state.order_service.get_order(&stranger, order.id).await,
        Err(MarketError::Forbidden(_))
    ));
    assert!(matches!(
        h.state.order_service.cancel(&stranger, order.id, None).await,
        Err(MarketError::Forbidden(_))
    ));
    assert!(!h.stock(artwork.id).await);
}

#[tokio::test]
async fn buyer_and_operators_are_emailed_after_commits() {
    let h = Harness::new();
    let admin = Caller::user(UserId::new(), Role::Admin);
    let user = Caller::user(UserId::new(), Role::Customer);
    let buyer = shipping().email;

    let shipped_work = h.artwork("Morning Ferry", dec!(10000), None).await;
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(
                &user,
                PlaceOrder {
                    items: Some(vec![original(shipped_work.id)]),
                    ..checkout(PaymentMethod::Card, None)
                },
            )
            .await
    );
    let (body, header) = success_callback(order.id, 10_000);
    assert_ok!(h.state.payment_service.reconcile_callback(&body, Some(&header)).await);
    assert_ok!(h.state.order_service.request_confirmation(&admin, order.id).await);
    assert_ok!(h.state.order_service.confirm(&admin, order.id).await);
    assert_ok!(
        h.state
            .order_service
            .ship(&admin, order.id, "TRK777".to_string(), Some("CJ".to_string()), None)
            .await
    );

    let mail = h.mail_for(&buyer, 2).await;
    let [paid, shipped] = mail.as_slice() else {
        panic!("expected two buyer emails, got {mail:?}");
    };
    assert!(paid.subject.contains("Payment received"));
    assert!(shipped.body.contains("TRK777"));
    assert!(shipped.body.contains("with CJ"));

    // Paid, then cancelled: the buyer hears about it, operators get a refund notice.
    let refunded_work = h.artwork("Evening Ferry", dec!(8000), None).await;
    let order = assert_ok!(
        h.state
            .order_service
            .create_order(
                &user,
                PlaceOrder {
                    items: Some(vec![original(refunded_work.id)]),
                    ..checkout(PaymentMethod::Card, None)
                },
            )
            .await
    );
    let (body, header) = success_callback(order.id, 8_000);
    assert_ok!(h.state.payment_service.reconcile_callback(&body, Some(&header)).await);
    assert_ok!(
        h.state
            .order_service
            .cancel(&user, order.id, Some("changed my mind".to_string()))
            .await
    );

    let mail = h.mail_for(&buyer, 4).await;
    let Some(cancelled) = mail.get(3) else {
        panic!("expected a cancellation email, got {mail:?}");
    };
    assert!(cancelled.body.contains("changed my mind"));
    // Two payment notices, the confirmation request and the refund notice.
    let internal = h.mail_for(OPERATORS, 4).await;
    assert!(
        internal
            .iter()
            .any(|n| n.subject.contains("refund needed") && n.subject.contains(&order.id.to_string()))
    );
}

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use gallery_orders::app_state::AppState;
use gallery_orders::config::MarketConfig;
use gallery_orders::domain::{
    Artwork, ArtworkId, CartLine, EventBus, ItemType, OrderId, PrintSize, ShippingInfo, UserId,
};
use gallery_orders::notify::{self, Notification, Notifier, OutboxNotifier, Recipient};
use gallery_orders::payment::signature;
use gallery_orders::persistence::{MarketStore, MemoryStore};

/// Webhook secret the harness is configured with.
pub const SECRET: &str = "whsec_integration";

/// Operators' address the dispatcher sends internal notices to.
pub const OPERATORS: &str = "ops@gallery.test";

/// In-memory service wiring, identical to what `main` builds.
#[derive(Debug, Clone)]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub outbox: Arc<OutboxNotifier>,
}

impl Harness {
    /// Must be called inside a tokio runtime: it spawns the notification
    /// dispatcher.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = MarketConfig {
            payment_webhook_secret: Some(SECRET.to_string()),
            ..MarketConfig::default()
        };
        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn MarketStore>,
            EventBus::new(256),
            &config,
        );
        let outbox = Arc::new(OutboxNotifier::new());
        let _dispatcher = notify::spawn_dispatcher(
            &state.event_bus,
            Arc::clone(&outbox) as Arc<dyn Notifier>,
            OPERATORS.to_string(),
        );
        Self {
            store,
            state,
            outbox,
        }
    }

    /// Waits until `address` has received at least `count` messages and
    /// returns them in delivery order.
    pub async fn mail_for(&self, address: &str, count: usize) -> Vec<Notification> {
        let recipient = Recipient::Email(address.to_string());
        let mut received = Vec::new();
        for _ in 0..200 {
            received = self
                .outbox
                .sent()
                .into_iter()
                .filter(|n| n.recipient == recipient)
                .collect();
            if received.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        received
    }

    /// Puts an in-stock artwork into the ledger.
    pub async fn artwork(&self, title: &str, price: Decimal, artist_id: Option<UserId>) -> Artwork {
        let artwork = Artwork {
            id: ArtworkId::new(),
            title: title.to_string(),
            artist_id,
            price,
            in_stock: true,
            updated_at: Utc::now(),
        };
        let Ok(()) = self.store.put_artwork(&artwork).await else {
            panic!("failed to store artwork");
        };
        artwork
    }

    /// Current ledger view of `id`.
    pub async fn stock(&self, id: ArtworkId) -> bool {
        let Ok(Some(artwork)) = self.store.artwork(id).await else {
            panic!("artwork {id} missing");
        };
        artwork.in_stock
    }
}

pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        recipient_name: "Mina Park".to_string(),
        email: "mina@example.com".to_string(),
        phone: "010-0000-0000".to_string(),
        address_line1: "12 Gallery Road".to_string(),
        address_line2: None,
        city: "Seoul".to_string(),
        postal_code: "04524".to_string(),
        country: "KR".to_string(),
    }
}

pub fn original(artwork_id: ArtworkId) -> CartLine {
    CartLine {
        artwork_id,
        quantity: 1,
        item_type: ItemType::Original,
        print_size: None,
    }
}

pub fn print(artwork_id: ArtworkId, quantity: u32) -> CartLine {
    CartLine {
        artwork_id,
        quantity,
        item_type: ItemType::Print,
        print_size: Some(PrintSize::A3),
    }
}

/// Signed `payment_intent.succeeded` callback for `order_id`.
pub fn success_callback(order_id: OrderId, amount: i64) -> (Vec<u8>, String) {
    callback("payment_intent.succeeded", order_id, amount)
}

/// Signed gateway callback of `event_type` for `order_id`.
pub fn callback(event_type: &str, order_id: OrderId, amount: i64) -> (Vec<u8>, String) {
    let body = serde_json::json!({
        "id": format!("evt_{order_id}"),
        "type": event_type,
        "data": {"object": {
            "id": format!("pi_{order_id}"),
            "amount": amount,
            "currency": "krw",
            "metadata": {"order_id": order_id.to_string()}
        }}
    })
    .to_string()
    .into_bytes();
    let Ok(header) = signature::sign(&body, SECRET, Utc::now().timestamp()) else {
        panic!("signing failed");
    };
    (body, header)
}

//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::MarketConfig;
use crate::domain::EventBus;
use crate::persistence::MarketStore;
use crate::service::{
    CartService, CatalogService, GatewaySettings, GiftCardService, OrderService, PaymentService,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cart lines and the guest merge.
    pub cart_service: Arc<CartService>,
    /// Order creation, queries and lifecycle transitions.
    pub order_service: Arc<OrderService>,
    /// Gateway callbacks and manual payment confirmation.
    pub payment_service: Arc<PaymentService>,
    /// Gift card issuance and redemption.
    pub gift_card_service: Arc<GiftCardService>,
    /// Inventory ledger sync.
    pub catalog_service: Arc<CatalogService>,
    /// Post-commit order events.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires every service on top of one store and one event bus.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, event_bus: EventBus, config: &MarketConfig) -> Self {
        let order_service = OrderService::new(Arc::clone(&store), event_bus.clone());
        let payment_service = PaymentService::new(
            order_service.clone(),
            GatewaySettings {
                webhook_secret: config.payment_webhook_secret.clone(),
                tolerance_secs: config.payment_webhook_tolerance_secs,
                currency: config.payment_currency.clone(),
            },
        );
        let gift_card_service = GiftCardService::new(
            Arc::clone(&store),
            event_bus.clone(),
            config.gift_card_validity(),
            config.payment_currency.clone(),
        );

        Self {
            cart_service: Arc::new(CartService::new(Arc::clone(&store))),
            order_service: Arc::new(order_service),
            payment_service: Arc::new(payment_service),
            gift_card_service: Arc::new(gift_card_service),
            catalog_service: Arc::new(CatalogService::new(
                store,
                config.payment_currency.clone(),
            )),
            event_bus,
        }
    }
}

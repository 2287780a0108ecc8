//! Payment reconciliation: gateway callbacks and manual confirmation.
//!
//! Both paths end in the same `PENDING → PAID` transition through
//! [`OrderService::apply_transition`], so the committed order and the
//! published [`OrderEvent::PaymentConfirmed`] are identical whichever path
//! confirmed the payment.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::OrderService;
use crate::domain::order::PaymentChannel;
use crate::domain::{Caller, Order, OrderEvent, OrderId, OrderStatus, OrderTransition};
use crate::error::MarketError;
use crate::payment::{GatewayEvent, GatewayEventKind, money, signature};

/// Gateway settings needed to trust and match callbacks.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Shared HMAC secret. `None` rejects every callback.
    pub webhook_secret: Option<String>,
    /// Maximum accepted signature timestamp skew, in seconds.
    pub tolerance_secs: u64,
    /// Currency order totals are denominated in.
    pub currency: String,
}

/// What a verified callback did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// The order moved to `PAID`.
    Applied {
        /// Paid order.
        order_id: OrderId,
    },
    /// The order had already been paid; nothing changed.
    Duplicate {
        /// Already-paid order.
        order_id: OrderId,
    },
    /// The gateway reported a failed payment; the order stays `PENDING`.
    PaymentFailed {
        /// Order the attempt was for.
        order_id: OrderId,
    },
    /// Acknowledged but not acted on.
    Ignored {
        /// Why the event was dropped.
        reason: String,
    },
}

impl CallbackOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

/// Bridges external payment confirmation into order transitions.
#[derive(Debug, Clone)]
pub struct PaymentService {
    orders: OrderService,
    settings: GatewaySettings,
}

impl PaymentService {
    /// Creates a new `PaymentService`.
    #[must_use]
    pub fn new(orders: OrderService, settings: GatewaySettings) -> Self {
        Self { orders, settings }
    }

    /// Handles a raw gateway callback.
    ///
    /// The signature is checked before anything else. Once verified, the
    /// callback is always acknowledged: events that cannot be matched to a
    /// payable order are logged and reported as
    /// [`CallbackOutcome::Ignored`], and replays of an already-applied
    /// payment are a [`CallbackOutcome::Duplicate`] no-op.
    ///
    /// # Errors
    ///
    /// - [`MarketError::GatewayVerificationFailed`] for a missing or
    ///   invalid signature.
    /// - [`MarketError::Persistence`] if the store fails.
    pub async fn reconcile_callback(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<CallbackOutcome, MarketError> {
        let header = signature_header.ok_or_else(|| {
            MarketError::GatewayVerificationFailed("missing signature header".to_string())
        })?;
        signature::verify(
            body,
            header,
            self.settings.webhook_secret.as_deref(),
            self.settings.tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event = match GatewayEvent::parse(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparsable gateway event");
                return Ok(CallbackOutcome::ignored("malformed event"));
            }
        };
        let kind = event.kind();
        if kind == GatewayEventKind::Other {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring gateway event");
            return Ok(CallbackOutcome::ignored("unhandled event type"));
        }

        let Some(order_id) = event.order_id() else {
            tracing::warn!(event_id = %event.id, "gateway event carries no order id");
            return Ok(CallbackOutcome::ignored("missing order metadata"));
        };
        let order = match self.orders.load(order_id).await {
            Ok(order) => order,
            Err(MarketError::NotFound { .. }) => {
                tracing::warn!(event_id = %event.id, %order_id, "gateway event for unknown order");
                return Ok(CallbackOutcome::ignored("unknown order"));
            }
            Err(e) => return Err(e),
        };

        if kind == GatewayEventKind::PaymentFailed {
            let reason = event.failure_reason();
            tracing::warn!(%order_id, reason = ?reason, status = %order.status, "gateway reported failed payment");
            if order.status != OrderStatus::Pending {
                return Ok(CallbackOutcome::ignored("order is not pending"));
            }
            self.orders.event_bus().publish(OrderEvent::PaymentFailed {
                order_id,
                reason,
                timestamp: Utc::now(),
            });
            return Ok(CallbackOutcome::PaymentFailed { order_id });
        }

        if order.status != OrderStatus::Pending {
            if order.paid_at.is_some() {
                tracing::info!(%order_id, event_id = %event.id, "duplicate payment callback");
                return Ok(CallbackOutcome::Duplicate { order_id });
            }
            tracing::warn!(%order_id, status = %order.status, "payment received for unpayable order");
            return Ok(CallbackOutcome::ignored("order is not pending"));
        }

        let object = &event.data.object;
        let expected = match money::to_minor_units(order.amount_due(), &self.settings.currency) {
            Ok(minor) => minor,
            Err(e) => {
                tracing::warn!(
                    %order_id,
                    amount_due = %order.amount_due(),
                    currency = %self.settings.currency,
                    error = %e,
                    "order amount cannot be matched against gateway minor units"
                );
                return Ok(CallbackOutcome::ignored("amount not representable"));
            }
        };
        if object.amount != expected || !object.currency.eq_ignore_ascii_case(&self.settings.currency) {
            tracing::warn!(
                %order_id,
                expected,
                expected_currency = %self.settings.currency,
                received = object.amount,
                received_amount = %event.amount(),
                received_currency = %object.currency,
                "payment amount mismatch"
            );
            return Ok(CallbackOutcome::ignored("amount mismatch"));
        }

        let transition = OrderTransition::ConfirmPayment {
            channel: PaymentChannel::Gateway,
            reference: Some(object.id.clone()),
        };
        match self.orders.apply_transition(order, &transition).await {
            Ok(_) => Ok(CallbackOutcome::Applied { order_id }),
            Err(MarketError::InvalidTransition { from, .. }) if from != OrderStatus::Pending => {
                tracing::info!(%order_id, %from, "payment callback lost race to a concurrent callback");
                Ok(CallbackOutcome::Duplicate { order_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Confirms a bank-transfer payment on an operator's word.
    ///
    /// Orders fully covered by a gift card may also be confirmed here,
    /// whatever their payment method.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] for non-admin callers.
    /// - [`MarketError::NotFound`] if the order does not exist.
    /// - [`MarketError::InvalidState`] if the order is not `PENDING` or is
    ///   meant to be paid through the gateway.
    pub async fn confirm_manual_payment(
        &self,
        caller: &Caller,
        id: OrderId,
        reference: Option<String>,
    ) -> Result<Order, MarketError> {
        caller.require_admin()?;
        let order = self.orders.load(id).await?;
        if order.status != OrderStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "order {id} is {}, manual payment needs PENDING",
                order.status
            )));
        }
        if !order.payment_method.is_manual() && !order.amount_due().is_zero() {
            return Err(MarketError::InvalidState(format!(
                "order {id} is paid by {}, not by bank transfer",
                order.payment_method.as_str()
            )));
        }

        let transition = OrderTransition::ConfirmPayment {
            channel: PaymentChannel::Manual,
            reference,
        };
        match self.orders.apply_transition(order, &transition).await {
            Err(MarketError::InvalidTransition { from, .. }) => Err(MarketError::InvalidState(
                format!("order {id} is {from}, manual payment needs PENDING"),
            )),
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::order::tests::shipping;
    use crate::domain::{Artwork, ArtworkId, CartLine, EventBus, ItemType, PaymentMethod, Role, UserId};
    use crate::persistence::{MarketStore, MemoryStore};
    use crate::service::order_service::PlaceOrder;

    const SECRET: &str = "whsec_unit";

    async fn setup(method: PaymentMethod) -> (PaymentService, EventBus, Order) {
        setup_priced(method, dec!(10000)).await
    }

    async fn setup_priced(method: PaymentMethod, price: Decimal) -> (PaymentService, EventBus, Order) {
        let store = Arc::new(MemoryStore::new());
        let artwork = Artwork {
            id: ArtworkId::new(),
            title: "Harbour at Dusk".to_string(),
            artist_id: None,
            price,
            in_stock: true,
            updated_at: Utc::now(),
        };
        assert_ok!(store.put_artwork(&artwork).await);
        let bus = EventBus::new(64);
        let orders = OrderService::new(store as Arc<dyn MarketStore>, bus.clone());
        let buyer = Caller::user(UserId::new(), Role::Customer);
        let order = assert_ok!(
            orders
                .create_order(
                    &buyer,
                    PlaceOrder {
                        items: Some(vec![CartLine {
                            artwork_id: artwork.id,
                            quantity: 1,
                            item_type: ItemType::Original,
                            print_size: None,
                        }]),
                        shipping: shipping(),
                        payment_method: method,
                        gift_card_code: None,
                    },
                )
                .await
        );
        let service = PaymentService::new(
            orders,
            GatewaySettings {
                webhook_secret: Some(SECRET.to_string()),
                tolerance_secs: 300,
                currency: "KRW".to_string(),
            },
        );
        (service, bus, order)
    }

    fn callback(event_type: &str, order_id: &str, amount: i64) -> (Vec<u8>, String) {
        let body = serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": {"object": {
                "id": "pi_1",
                "amount": amount,
                "currency": "krw",
                "metadata": {"order_id": order_id}
            }}
        })
        .to_string()
        .into_bytes();
        let Ok(header) = signature::sign(&body, SECRET, Utc::now().timestamp()) else {
            panic!("sign failed");
        };
        (body, header)
    }

    #[tokio::test]
    async fn replayed_success_is_applied_once() {
        let (service, bus, order) = setup(PaymentMethod::Card).await;
        let mut events = bus.subscribe();
        let (body, header) = callback("payment_intent.succeeded", &order.id.to_string(), 10_000);

        let first = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert_eq!(first, CallbackOutcome::Applied { order_id: order.id });
        let second = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert_eq!(second, CallbackOutcome::Duplicate { order_id: order.id });

        let mut confirmations = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, OrderEvent::PaymentConfirmed { .. }) {
                confirmations += 1;
            }
        }
        assert_eq!(confirmations, 1);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_parsing() {
        let (service, _, order) = setup(PaymentMethod::Card).await;
        let (body, _) = callback("payment_intent.succeeded", &order.id.to_string(), 10_000);
        let result = service.reconcile_callback(&body, Some("t=1,v1=00")).await;
        assert!(matches!(result, Err(MarketError::GatewayVerificationFailed(_))));
        let result = service.reconcile_callback(&body, None).await;
        assert!(matches!(result, Err(MarketError::GatewayVerificationFailed(_))));
    }

    #[tokio::test]
    async fn unmatched_events_are_acknowledged_and_dropped() {
        let (service, _, order) = setup(PaymentMethod::Card).await;

        let (body, header) = callback("payment_intent.succeeded", &OrderId::new().to_string(), 10_000);
        let outcome = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert!(matches!(outcome, CallbackOutcome::Ignored { .. }));

        let (body, header) = callback("payment_intent.succeeded", "not-a-uuid", 10_000);
        let outcome = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert!(matches!(outcome, CallbackOutcome::Ignored { .. }));

        let (body, header) = callback("payment_intent.succeeded", &order.id.to_string(), 9_999);
        let outcome = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert_eq!(outcome, CallbackOutcome::Ignored { reason: "amount mismatch".into() });
    }

    #[tokio::test]
    async fn fractional_amount_due_is_acknowledged_not_rejected() {
        let (service, _, order) = setup_priced(PaymentMethod::Card, dec!(10000.50)).await;

        for amount in [10_000, 10_001] {
            let (body, header) = callback("payment_intent.succeeded", &order.id.to_string(), amount);
            let outcome = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
            assert_eq!(
                outcome,
                CallbackOutcome::Ignored { reason: "amount not representable".into() }
            );
        }
        let reloaded = assert_ok!(service.orders.load(order.id).await);
        assert_eq!(reloaded.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn failed_payment_leaves_order_pending() {
        let (service, _, order) = setup(PaymentMethod::Card).await;
        let (body, header) = callback("payment_intent.payment_failed", &order.id.to_string(), 10_000);
        let outcome = assert_ok!(service.reconcile_callback(&body, Some(&header)).await);
        assert_eq!(outcome, CallbackOutcome::PaymentFailed { order_id: order.id });
        let reloaded = assert_ok!(service.orders.load(order.id).await);
        assert_eq!(reloaded.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn manual_confirmation_rules() {
        let admin = Caller::user(UserId::new(), Role::Admin);

        let (service, _, card_order) = setup(PaymentMethod::Card).await;
        let result = service.confirm_manual_payment(&admin, card_order.id, None).await;
        assert!(matches!(result, Err(MarketError::InvalidState(_))));

        let (service, _, order) = setup(PaymentMethod::BankTransfer).await;
        let customer = Caller::user(UserId::new(), Role::Customer);
        assert!(matches!(
            service.confirm_manual_payment(&customer, order.id, None).await,
            Err(MarketError::Forbidden(_))
        ));
        let paid = assert_ok!(
            service
                .confirm_manual_payment(&admin, order.id, Some("bank-ref-7".into()))
                .await
        );
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_channel, Some(PaymentChannel::Manual));

        let again = service.confirm_manual_payment(&admin, order.id, None).await;
        assert!(matches!(again, Err(MarketError::InvalidState(_))));
    }
}

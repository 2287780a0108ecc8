//! Gateway callback payloads.
//!
//! Only the fields reconciliation needs are modelled; everything else in
//! the gateway's event object is ignored.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::money;
use crate::domain::OrderId;
use crate::error::MarketError;

/// Metadata key carrying the order id on the payment object.
pub const ORDER_ID_METADATA_KEY: &str = "order_id";

/// What a callback reports, as far as reconciliation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventKind {
    /// The payment succeeded.
    PaymentSucceeded,
    /// The payment attempt failed.
    PaymentFailed,
    /// Any other event type.
    Other,
}

/// A verified callback from the payment gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    /// Gateway event id.
    pub id: String,
    /// Gateway event type, e.g. `payment_intent.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: GatewayEventData,
}

/// Envelope around the payment object.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    /// The payment the event is about.
    pub object: PaymentObject,
}

/// The gateway's payment record.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentObject {
    /// Gateway payment id.
    pub id: String,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: i64,
    /// Lower-case ISO currency code.
    #[serde(default)]
    pub currency: String,
    /// Merchant metadata attached at payment creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Failure details on failed payments.
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
}

/// Failure details reported by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentError {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

impl GatewayEvent {
    /// Parses a raw callback body.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the body is not a gateway
    /// event.
    pub fn parse(body: &[u8]) -> Result<Self, MarketError> {
        serde_json::from_slice(body)
            .map_err(|e| MarketError::Validation(format!("malformed gateway event: {e}")))
    }

    /// Classifies the event type.
    #[must_use]
    pub fn kind(&self) -> GatewayEventKind {
        match self.event_type.as_str() {
            "payment_intent.succeeded" | "charge.succeeded" => GatewayEventKind::PaymentSucceeded,
            "payment_intent.payment_failed" | "charge.failed" => GatewayEventKind::PaymentFailed,
            _ => GatewayEventKind::Other,
        }
    }

    /// Order id carried in the payment metadata, if present and well-formed.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.data
            .object
            .metadata
            .get(ORDER_ID_METADATA_KEY)
            .and_then(|raw| raw.parse().ok())
    }

    /// Paid amount converted out of minor units.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        money::from_minor_units(self.data.object.amount, &self.data.object.currency)
    }

    /// Gateway-provided failure message.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.data
            .object
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_succeeded_event() {
        let order_id = OrderId::new();
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_1",
                "amount": 10000,
                "currency": "krw",
                "metadata": {"order_id": order_id.to_string()}
            }}
        })
        .to_string();

        let Ok(event) = GatewayEvent::parse(body.as_bytes()) else {
            panic!("event should parse");
        };
        assert_eq!(event.kind(), GatewayEventKind::PaymentSucceeded);
        assert_eq!(event.order_id(), Some(order_id));
        assert_eq!(event.amount(), dec!(10000));
    }

    #[test]
    fn missing_or_bad_metadata_yields_no_order() {
        let body = br#"{"id":"evt_2","type":"payment_intent.payment_failed",
            "data":{"object":{"id":"pi_2","metadata":{"order_id":"nope"},
            "last_payment_error":{"message":"card declined"}}}}"#;
        let Ok(event) = GatewayEvent::parse(body) else {
            panic!("event should parse");
        };
        assert_eq!(event.kind(), GatewayEventKind::PaymentFailed);
        assert!(event.order_id().is_none());
        assert_eq!(event.failure_reason().as_deref(), Some("card declined"));
    }

    #[test]
    fn rejects_non_event_body() {
        assert!(GatewayEvent::parse(b"[]").is_err());
    }
}

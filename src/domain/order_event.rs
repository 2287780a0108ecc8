//! Domain events published after a state change has been committed.
//!
//! Every committed mutation emits an [`OrderEvent`] through the
//! [`super::EventBus`]. The notification dispatcher subscribes to the bus,
//! so a slow or failing mail collaborator can never roll back the change
//! that produced the event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::order::{Confirmer, Order, OrderTransition, PaymentChannel};
use super::{OrderId, UserId};

/// Domain event emitted after every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// A new order was materialized.
    OrderPlaced {
        /// Order identifier.
        order_id: OrderId,
        /// Sum of the line snapshots.
        total_amount: Decimal,
        /// Amount left to pay after the gift card.
        amount_due: Decimal,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// `PENDING → PAID`.
    PaymentConfirmed {
        /// Order identifier.
        order_id: OrderId,
        /// Path that confirmed the payment.
        channel: PaymentChannel,
        /// Buyer contact email.
        buyer_email: String,
        /// Buyer name.
        buyer_name: String,
        /// Amount paid.
        amount: Decimal,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// `PAID → AWAITING_CONFIRMATION`.
    ConfirmationRequested {
        /// Order identifier.
        order_id: OrderId,
        /// Artists who must confirm availability.
        artist_ids: Vec<UserId>,
        /// Titles of the works on the order.
        titles: Vec<String>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// `AWAITING_CONFIRMATION → CONFIRMED`.
    OrderConfirmed {
        /// Order identifier.
        order_id: OrderId,
        /// Confirming party.
        by: Confirmer,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// `CONFIRMED → SHIPPED`.
    OrderShipped {
        /// Order identifier.
        order_id: OrderId,
        /// Buyer contact email.
        buyer_email: String,
        /// Buyer name.
        buyer_name: String,
        /// Carrier tracking number.
        tracking_number: String,
        /// Carrier name.
        carrier: Option<String>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// `SHIPPED → DELIVERED`.
    OrderDelivered {
        /// Order identifier.
        order_id: OrderId,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Any non-terminal status `→ CANCELLED`.
    OrderCancelled {
        /// Order identifier.
        order_id: OrderId,
        /// Buyer contact email.
        buyer_email: String,
        /// Buyer name.
        buyer_name: String,
        /// Cancellation reason.
        reason: Option<String>,
        /// Payment had been taken; someone must refund it by hand.
        refund_required: bool,
        /// Number of originals put back in stock.
        released_originals: usize,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gateway reported a failed payment. The order stays `PENDING`.
    PaymentFailed {
        /// Order identifier.
        order_id: OrderId,
        /// Gateway-provided failure reason.
        reason: Option<String>,
        /// Receipt timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gift card was issued.
    GiftCardIssued {
        /// Redemption code.
        code: String,
        /// Face amount.
        amount: Decimal,
        /// Recipient email.
        recipient_email: Option<String>,
        /// End of validity.
        expires_at: DateTime<Utc>,
        /// Issuance timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl OrderEvent {
    /// Builds the event for a committed transition on `order` (the order as
    /// it is after the transition).
    #[must_use]
    pub fn for_transition(order: &Order, transition: &OrderTransition) -> Self {
        let order_id = order.id;
        let timestamp = order.updated_at;
        match transition {
            OrderTransition::ConfirmPayment { channel, .. } => Self::PaymentConfirmed {
                order_id,
                channel: *channel,
                buyer_email: order.shipping.email.clone(),
                buyer_name: order.shipping.recipient_name.clone(),
                amount: order.amount_due(),
                timestamp,
            },
            OrderTransition::RequestConfirmation => Self::ConfirmationRequested {
                order_id,
                artist_ids: order.artist_ids(),
                titles: order.items.iter().map(|item| item.title.clone()).collect(),
                timestamp,
            },
            OrderTransition::Confirm { by } => Self::OrderConfirmed {
                order_id,
                by: *by,
                timestamp,
            },
            OrderTransition::Ship { .. } => Self::OrderShipped {
                order_id,
                buyer_email: order.shipping.email.clone(),
                buyer_name: order.shipping.recipient_name.clone(),
                tracking_number: order.tracking_number.clone().unwrap_or_default(),
                carrier: order.carrier.clone(),
                timestamp,
            },
            OrderTransition::Deliver => Self::OrderDelivered {
                order_id,
                timestamp,
            },
            OrderTransition::Cancel { reason } => Self::OrderCancelled {
                order_id,
                buyer_email: order.shipping.email.clone(),
                buyer_name: order.shipping.recipient_name.clone(),
                reason: reason.clone(),
                refund_required: order.paid_at.is_some() && order.amount_due() > Decimal::ZERO,
                released_originals: order.originals().count(),
                timestamp,
            },
        }
    }

    /// Returns the order this event refers to, if any.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::OrderPlaced { order_id, .. }
            | Self::PaymentConfirmed { order_id, .. }
            | Self::ConfirmationRequested { order_id, .. }
            | Self::OrderConfirmed { order_id, .. }
            | Self::OrderShipped { order_id, .. }
            | Self::OrderDelivered { order_id, .. }
            | Self::OrderCancelled { order_id, .. }
            | Self::PaymentFailed { order_id, .. } => Some(*order_id),
            Self::GiftCardIssued { .. } => None,
        }
    }

    /// Snake-case event type discriminator.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order_placed",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::OrderConfirmed { .. } => "order_confirmed",
            Self::OrderShipped { .. } => "order_shipped",
            Self::OrderDelivered { .. } => "order_delivered",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::GiftCardIssued { .. } => "gift_card_issued",
        }
    }
}

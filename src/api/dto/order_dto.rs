//! Order DTOs: checkout, listings and lifecycle actions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::cart_dto::CartLineRequest;
use super::common_dto::{PaginationMeta, default_page, default_per_page};
use crate::domain::{
    Order, OrderId, OrderItem, OrderStatus, PaymentMethod, ShippingInfo, order::PaymentChannel,
};

/// Request body for `POST /orders`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Lines to buy directly. When omitted the caller's cart is checked
    /// out and then cleared.
    #[serde(default)]
    pub items: Option<Vec<CartLineRequest>>,
    /// Shipping address.
    pub shipping: ShippingInfo,
    /// `card` or `bank_transfer`.
    pub payment_method: PaymentMethod,
    /// Gift card to apply against the total.
    #[serde(default)]
    pub gift_card_code: Option<String>,
}

/// Query parameters for `GET /orders`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersParams {
    /// Only orders in this status.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Only orders of this identity (`user:<uuid>` or `guest:<session>`).
    /// Ignored for non-admin callers.
    #[serde(default)]
    pub owner: Option<String>,
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Request body for `POST /orders/{id}/ship`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ShipOrderRequest {
    /// Carrier tracking number.
    pub tracking_number: String,
    /// Carrier name.
    #[serde(default)]
    pub carrier: Option<String>,
    /// Operator notes recorded with the shipment.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for `POST /orders/{id}/cancel`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    /// Why the order was cancelled.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for `PUT /orders/{id}/notes`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderNotesRequest {
    /// Replacement notes; `null` or blank clears them.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for `POST /orders/{id}/confirm-payment`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    /// Bank transfer reference or operator note.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Full order view.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    /// Order identifier.
    pub id: OrderId,
    /// Buyer identity (`user:<uuid>` or `guest:<session>`).
    pub owner: String,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Price-snapshotted lines.
    pub items: Vec<OrderItem>,
    /// Sum of the line snapshots. Never changes after creation.
    pub total_amount: Decimal,
    /// Gift card applied at checkout.
    pub gift_card_code: Option<String>,
    /// Amount covered by the gift card.
    pub gift_card_amount: Decimal,
    /// Amount left to pay.
    pub amount_due: Decimal,
    /// Payment method chosen at checkout.
    pub payment_method: PaymentMethod,
    /// How the payment was confirmed.
    pub payment_channel: Option<PaymentChannel>,
    /// Gateway payment id or operator reference.
    pub payment_reference: Option<String>,
    /// Shipping address snapshot.
    pub shipping: ShippingInfo,
    /// Carrier tracking number.
    pub tracking_number: Option<String>,
    /// Carrier name.
    pub carrier: Option<String>,
    /// Operator notes.
    pub admin_notes: Option<String>,
    /// Cancellation reason.
    pub cancel_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// `PENDING → PAID`.
    pub paid_at: Option<DateTime<Utc>>,
    /// `PAID → AWAITING_CONFIRMATION`.
    pub artist_notified_at: Option<DateTime<Utc>>,
    /// Confirmed by the artist.
    pub artist_confirmed_at: Option<DateTime<Utc>>,
    /// Confirmed by an admin.
    pub admin_confirmed_at: Option<DateTime<Utc>>,
    /// `CONFIRMED → SHIPPED`.
    pub shipped_at: Option<DateTime<Utc>>,
    /// `SHIPPED → DELIVERED`.
    pub delivered_at: Option<DateTime<Utc>>,
    /// `→ CANCELLED`.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let amount_due = order.amount_due();
        Self {
            id: order.id,
            owner: order.owner.to_string(),
            status: order.status,
            items: order.items,
            total_amount: order.total_amount,
            gift_card_code: order.gift_card_code,
            gift_card_amount: order.gift_card_amount,
            amount_due,
            payment_method: order.payment_method,
            payment_channel: order.payment_channel,
            payment_reference: order.payment_reference,
            shipping: order.shipping,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            admin_notes: order.admin_notes,
            cancel_reason: order.cancel_reason,
            created_at: order.created_at,
            paid_at: order.paid_at,
            artist_notified_at: order.artist_notified_at,
            artist_confirmed_at: order.artist_confirmed_at,
            admin_confirmed_at: order.admin_confirmed_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
            updated_at: order.updated_at,
        }
    }
}

/// Compact order row for listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    /// Order identifier.
    pub id: OrderId,
    /// Buyer identity.
    pub owner: String,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Number of lines.
    pub item_count: usize,
    /// Snapshot total.
    pub total_amount: Decimal,
    /// Amount left to pay.
    pub amount_due: Decimal,
    /// Buyer name from the shipping address.
    pub recipient_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            owner: order.owner.to_string(),
            status: order.status,
            item_count: order.items.len(),
            total_amount: order.total_amount,
            amount_due: order.amount_due(),
            recipient_name: order.shipping.recipient_name,
            created_at: order.created_at,
        }
    }
}

/// Response body for `GET /orders`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    /// Orders on this page, newest first.
    pub orders: Vec<OrderSummary>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

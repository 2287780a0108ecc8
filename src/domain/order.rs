//! Order aggregate and its status state machine.
//!
//! An [`Order`] is materialized once from a list of cart lines with an
//! immutable price snapshot per item. After that only its status (and the
//! timestamp/tracking/notes fields attached to status changes) can move,
//! and only along the edges of [`OrderStatus::next`].
//!
//! ```text
//! PENDING ─▶ PAID ─▶ AWAITING_CONFIRMATION ─▶ CONFIRMED ─▶ SHIPPED ─▶ DELIVERED
//!    │         │              │                   │           │
//!    └─────────┴──────────────┴───────────────────┴───────────┴──▶ CANCELLED
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::cart::CartLine;
use super::gift_card::GiftCardApplication;
use super::{Artwork, ArtworkId, ItemType, OrderId, Owner, PrintSize, UserId};
use crate::error::MarketError;

/// Maximum length of free-text fields (notes, reasons, carrier).
pub const MAX_TEXT_LEN: usize = 2_000;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting payment. Sole initial state.
    Pending,
    /// Payment received.
    Paid,
    /// Fulfilling party asked to confirm availability.
    AwaitingConfirmation,
    /// Fulfilling party confirmed.
    Confirmed,
    /// Handed to a carrier.
    Shipped,
    /// Received by the buyer. Terminal.
    Delivered,
    /// Cancelled. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Paid,
        Self::AwaitingConfirmation,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The transition table. Returns the target status for `event`, or
    /// `None` if the event is illegal from `self`.
    #[must_use]
    pub const fn next(self, event: TransitionKind) -> Option<Self> {
        use OrderStatus::{
            AwaitingConfirmation, Cancelled, Confirmed, Delivered, Paid, Pending, Shipped,
        };
        use TransitionKind::{Cancel, Confirm, ConfirmPayment, Deliver, RequestConfirmation, Ship};

        match (self, event) {
            (Pending, ConfirmPayment) => Some(Paid),
            (Paid, RequestConfirmation) => Some(AwaitingConfirmation),
            (AwaitingConfirmation, Confirm) => Some(Confirmed),
            (Confirmed, Ship) => Some(Shipped),
            (Shipped, Deliver) => Some(Delivered),
            (Pending | Paid | AwaitingConfirmation | Confirmed | Shipped, Cancel) => {
                Some(Cancelled)
            }
            _ => None,
        }
    }

    /// Returns `true` for `DELIVERED` and `CANCELLED`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Stable string form used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            Self::Confirmed => "CONFIRMED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MarketError::Validation(format!("unknown order status: {s}")))
    }
}

/// Discriminant of an [`OrderTransition`], used in the transition table
/// and in [`MarketError::InvalidTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Payment confirmed by the gateway or an operator.
    ConfirmPayment,
    /// Admin asks the fulfilling party to confirm availability.
    RequestConfirmation,
    /// Fulfilling party (or admin on its behalf) confirms.
    Confirm,
    /// Shipment recorded.
    Ship,
    /// Receipt recorded.
    Deliver,
    /// Order cancelled.
    Cancel,
}

impl TransitionKind {
    /// All events.
    pub const ALL: [Self; 6] = [
        Self::ConfirmPayment,
        Self::RequestConfirmation,
        Self::Confirm,
        Self::Ship,
        Self::Deliver,
        Self::Cancel,
    ];
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConfirmPayment => "confirm payment of",
            Self::RequestConfirmation => "request confirmation for",
            Self::Confirm => "confirm",
            Self::Ship => "ship",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        })
    }
}

/// Path through which a payment was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// Signed gateway callback.
    Gateway,
    /// Operator confirmation (bank transfer).
    Manual,
}

impl PaymentChannel {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for PaymentChannel {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(Self::Gateway),
            "manual" => Ok(Self::Manual),
            other => Err(MarketError::Validation(format!("unknown payment channel: {other}"))),
        }
    }
}

/// Who confirmed availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmer {
    /// Admin acting on the artist's behalf.
    Admin,
    /// The artist directly.
    Artist,
}

/// A requested status change with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTransition {
    /// `PENDING → PAID`.
    ConfirmPayment {
        /// Which path confirmed the payment.
        channel: PaymentChannel,
        /// Gateway payment id or operator reference.
        reference: Option<String>,
    },
    /// `PAID → AWAITING_CONFIRMATION`.
    RequestConfirmation,
    /// `AWAITING_CONFIRMATION → CONFIRMED`.
    Confirm {
        /// Confirming party.
        by: Confirmer,
    },
    /// `CONFIRMED → SHIPPED`.
    Ship {
        /// Carrier tracking number. Must not be blank.
        tracking_number: String,
        /// Carrier name.
        carrier: Option<String>,
        /// Admin notes recorded with the shipment.
        notes: Option<String>,
    },
    /// `SHIPPED → DELIVERED`.
    Deliver,
    /// Any non-terminal status `→ CANCELLED`.
    Cancel {
        /// Optional cancellation reason.
        reason: Option<String>,
    },
}

impl OrderTransition {
    /// Discriminant of this transition.
    #[must_use]
    pub const fn kind(&self) -> TransitionKind {
        match self {
            Self::ConfirmPayment { .. } => TransitionKind::ConfirmPayment,
            Self::RequestConfirmation => TransitionKind::RequestConfirmation,
            Self::Confirm { .. } => TransitionKind::Confirm,
            Self::Ship { .. } => TransitionKind::Ship,
            Self::Deliver => TransitionKind::Deliver,
            Self::Cancel { .. } => TransitionKind::Cancel,
        }
    }
}

/// Payment method selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the external gateway.
    Card,
    /// Bank transfer, confirmed manually by an operator.
    BankTransfer,
}

impl PaymentMethod {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
        }
    }

    /// Returns `true` if payment is confirmed by an operator.
    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::BankTransfer)
    }
}

impl FromStr for PaymentMethod {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "bank_transfer" => Ok(Self::BankTransfer),
            other => Err(MarketError::Validation(format!("unknown payment method: {other}"))),
        }
    }
}

/// Shipping address snapshot taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingInfo {
    /// Recipient full name.
    pub recipient_name: String,
    /// Contact email; order emails go here.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Street address.
    pub address_line1: String,
    /// Apartment, suite, etc.
    #[serde(default)]
    pub address_line2: Option<String>,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// ISO country code or name.
    pub country: String,
}

impl ShippingInfo {
    /// Checks required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] naming the first bad field.
    pub fn validate(&self) -> Result<(), MarketError> {
        let required = [
            ("recipient_name", &self.recipient_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address_line1", &self.address_line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MarketError::Validation(format!("shipping.{field} is required")));
            }
            if value.len() > 200 {
                return Err(MarketError::Validation(format!("shipping.{field} is too long")));
            }
        }
        if !self.email.contains('@') {
            return Err(MarketError::Validation(format!(
                "shipping.email is not an email address: {}",
                self.email
            )));
        }
        Ok(())
    }
}

/// Immutable order line with its price-at-purchase snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    /// Artwork reference, for display only.
    pub artwork_id: ArtworkId,
    /// Title at purchase time.
    pub title: String,
    /// Fulfilling artist at purchase time.
    pub artist_id: Option<UserId>,
    /// Sale format.
    pub item_type: ItemType,
    /// Print size, `None` for originals.
    pub print_size: Option<PrintSize>,
    /// Quantity bought.
    pub quantity: u32,
    /// Unit price at purchase. Never re-read from the catalog.
    pub price_at_purchase: Decimal,
}

impl OrderItem {
    /// `price_at_purchase × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price_at_purchase * Decimal::from(self.quantity)
    }
}

/// Effects a cancellation must undo, applied in the same unit of work as
/// the status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasePlan {
    /// ORIGINAL artworks to put back in stock.
    pub originals: Vec<ArtworkId>,
    /// Gift card amount to credit back.
    pub gift_card_credit: Option<GiftCardCredit>,
}

impl ReleasePlan {
    /// Returns `true` if there is nothing to undo.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.gift_card_credit.is_none()
    }
}

/// Amount to return to a gift card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftCardCredit {
    /// Card code.
    pub code: String,
    /// Amount originally applied to the order.
    pub amount: Decimal,
}

/// A materialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Buyer identity.
    pub owner: Owner,
    /// Shipping snapshot.
    pub shipping: ShippingInfo,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
    /// Line snapshots.
    pub items: Vec<OrderItem>,
    /// Sum of line totals, computed once at creation.
    pub total_amount: Decimal,
    /// Gift card applied at checkout.
    pub gift_card_code: Option<String>,
    /// Amount covered by the gift card.
    pub gift_card_amount: Decimal,
    /// Current status.
    pub status: OrderStatus,
    /// Channel that confirmed payment.
    pub payment_channel: Option<PaymentChannel>,
    /// Gateway payment id or operator reference.
    pub payment_reference: Option<String>,
    /// Carrier tracking number.
    pub tracking_number: Option<String>,
    /// Carrier name.
    pub carrier: Option<String>,
    /// Operator notes.
    pub admin_notes: Option<String>,
    /// Why the order was cancelled.
    pub cancel_reason: Option<String>,
    /// Creation time (`PENDING`).
    pub created_at: DateTime<Utc>,
    /// Time of `PAID`.
    pub paid_at: Option<DateTime<Utc>>,
    /// Time of `AWAITING_CONFIRMATION`.
    pub artist_notified_at: Option<DateTime<Utc>>,
    /// Time the artist confirmed directly.
    pub artist_confirmed_at: Option<DateTime<Utc>>,
    /// Time an admin confirmed on the artist's behalf.
    pub admin_confirmed_at: Option<DateTime<Utc>>,
    /// Time of `SHIPPED`.
    pub shipped_at: Option<DateTime<Utc>>,
    /// Time of `DELIVERED`.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Time of `CANCELLED`.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of the immutable line snapshots.
    #[must_use]
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// What the buyer still has to pay after the gift card.
    #[must_use]
    pub fn amount_due(&self) -> Decimal {
        (self.total_amount - self.gift_card_amount).max(Decimal::ZERO)
    }

    /// Artwork ids of the ORIGINAL lines.
    pub fn originals(&self) -> impl Iterator<Item = ArtworkId> + '_ {
        self.items
            .iter()
            .filter(|item| item.item_type == ItemType::Original)
            .map(|item| item.artwork_id)
    }

    /// Artists fulfilling at least one line, deduplicated.
    #[must_use]
    pub fn artist_ids(&self) -> Vec<UserId> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter_map(|item| item.artist_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Records a gift card debit taken at checkout.
    pub fn record_gift_card(&mut self, application: &GiftCardApplication) {
        self.gift_card_code = Some(application.code.clone());
        self.gift_card_amount = application.applied_amount;
    }

    /// What cancelling this order must undo.
    #[must_use]
    pub fn release_plan(&self) -> ReleasePlan {
        ReleasePlan {
            originals: self.originals().collect(),
            gift_card_credit: self
                .gift_card_code
                .as_ref()
                .filter(|_| self.gift_card_amount > Decimal::ZERO)
                .map(|code| GiftCardCredit {
                    code: code.clone(),
                    amount: self.gift_card_amount,
                }),
        }
    }

    /// Applies `transition` in place, stamping the matching timestamp.
    ///
    /// The order is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidTransition`] if the table has no edge
    /// for this event from the current status, or
    /// [`MarketError::Validation`] for a malformed payload (blank tracking
    /// number, oversized text).
    pub fn apply(&mut self, transition: &OrderTransition, now: DateTime<Utc>) -> Result<(), MarketError> {
        let from = self.status;
        let event = transition.kind();
        let to = from
            .next(event)
            .ok_or(MarketError::InvalidTransition { from, event })?;

        match transition {
            OrderTransition::ConfirmPayment { channel, reference } => {
                self.paid_at = Some(now);
                self.payment_channel = Some(*channel);
                self.payment_reference.clone_from(reference);
            }
            OrderTransition::RequestConfirmation => {
                self.artist_notified_at = Some(now);
            }
            OrderTransition::Confirm { by } => match by {
                Confirmer::Admin => self.admin_confirmed_at = Some(now),
                Confirmer::Artist => self.artist_confirmed_at = Some(now),
            },
            OrderTransition::Ship {
                tracking_number,
                carrier,
                notes,
            } => {
                let tracking_number = tracking_number.trim();
                if tracking_number.is_empty() {
                    return Err(MarketError::Validation(
                        "tracking number is required to ship".to_string(),
                    ));
                }
                check_text("carrier", carrier.as_deref())?;
                check_text("notes", notes.as_deref())?;
                self.tracking_number = Some(tracking_number.to_string());
                self.carrier = carrier.as_ref().map(|c| c.trim().to_string());
                if notes.is_some() {
                    self.admin_notes.clone_from(notes);
                }
                self.shipped_at = Some(now);
            }
            OrderTransition::Deliver => {
                self.delivered_at = Some(now);
            }
            OrderTransition::Cancel { reason } => {
                check_text("reason", reason.as_deref())?;
                self.cancel_reason.clone_from(reason);
                self.cancelled_at = Some(now);
            }
        }

        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

/// Rejects text fields over [`MAX_TEXT_LEN`].
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for oversized text.
pub fn check_text(field: &str, value: Option<&str>) -> Result<(), MarketError> {
    match value {
        Some(text) if text.len() > MAX_TEXT_LEN => Err(MarketError::Validation(format!(
            "{field} exceeds {MAX_TEXT_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Everything needed to materialize an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Buyer identity.
    pub owner: Owner,
    /// Lines to buy, either the owner's cart or an explicit list.
    pub lines: Vec<CartLine>,
    /// Shipping snapshot.
    pub shipping: ShippingInfo,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
    /// Gift card to apply against the total.
    pub gift_card_code: Option<String>,
    /// Whether to clear the owner's cart in the same unit of work.
    pub clear_cart: bool,
}

impl CheckoutRequest {
    /// Validates the request shape before any store access.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for an empty item list,
    /// malformed lines, an ORIGINAL listed twice, or bad shipping info.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.lines.is_empty() {
            return Err(MarketError::Validation("order has no items".to_string()));
        }
        let mut originals = HashSet::new();
        for line in &self.lines {
            line.validate()?;
            if line.item_type == ItemType::Original && !originals.insert(line.artwork_id) {
                return Err(MarketError::Validation(format!(
                    "original {} listed more than once",
                    line.artwork_id
                )));
            }
        }
        self.shipping.validate()
    }

    /// Distinct artwork ids referenced by the request.
    #[must_use]
    pub fn artwork_ids(&self) -> Vec<ArtworkId> {
        let mut seen = HashSet::new();
        self.lines
            .iter()
            .map(|line| line.artwork_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Builds a `PENDING` order from `request` against freshly read
/// `artworks`.
///
/// Pure: the caller is responsible for running this inside the
/// transaction that also flips stock, so that the availability check here
/// and the stock update cannot interleave with another checkout.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if an artwork is missing and
/// [`MarketError::OutOfStock`] (with the artwork title) if any ORIGINAL is
/// no longer in stock. No order is produced in either case.
pub fn materialize(
    request: &CheckoutRequest,
    artworks: &HashMap<ArtworkId, Artwork>,
    now: DateTime<Utc>,
) -> Result<Order, MarketError> {
    let mut items = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let artwork = artworks
            .get(&line.artwork_id)
            .ok_or_else(|| MarketError::not_found("artwork", line.artwork_id))?;
        if !artwork.available_as(line.item_type) {
            return Err(MarketError::OutOfStock(artwork.title.clone()));
        }
        items.push(OrderItem {
            artwork_id: artwork.id,
            title: artwork.title.clone(),
            artist_id: artwork.artist_id,
            item_type: line.item_type,
            print_size: line.print_size,
            quantity: line.quantity,
            price_at_purchase: artwork.price,
        });
    }

    let total_amount = items.iter().map(OrderItem::line_total).sum();

    Ok(Order {
        id: OrderId::new(),
        owner: request.owner.clone(),
        shipping: request.shipping.clone(),
        payment_method: request.payment_method,
        items,
        total_amount,
        gift_card_code: None,
        gift_card_amount: Decimal::ZERO,
        status: OrderStatus::Pending,
        payment_channel: None,
        payment_reference: None,
        tracking_number: None,
        carrier: None,
        admin_notes: None,
        cancel_reason: None,
        created_at: now,
        paid_at: None,
        artist_notified_at: None,
        artist_confirmed_at: None,
        admin_confirmed_at: None,
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
        updated_at: now,
    })
}

/// Filters for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Only orders in this status.
    pub status: Option<OrderStatus>,
    /// Only orders owned by this identity.
    pub owner: Option<Owner>,
    /// Page number (1-indexed).
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl OrderFilter {
    /// Rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }

    /// Returns `true` if `order` passes the status/owner filters.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|status| order.status == status)
            && self.owner.as_ref().is_none_or(|owner| &order.owner == owner)
    }
}

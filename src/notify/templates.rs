//! Plain-text notifications derived from committed events.

use std::fmt;

use crate::domain::{OrderEvent, UserId};

/// Where a notification goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A concrete email address (buyer, gift card recipient, operators).
    Email(String),
    /// An artist, resolved to an address by the identity collaborator.
    Artist(UserId),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email(address) => f.write_str(address),
            Self::Artist(id) => write!(f, "artist:{id}"),
        }
    }
}

/// A message ready to hand to a [`super::Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Destination.
    pub recipient: Recipient,
    /// Event type that produced the message.
    pub kind: &'static str,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl Notification {
    fn new(recipient: Recipient, kind: &'static str, subject: String, body: String) -> Self {
        Self {
            recipient,
            kind,
            subject,
            body,
        }
    }
}

/// Builds every notification an event calls for. `internal` is the
/// operators' address.
#[must_use]
pub fn notifications_for(event: &OrderEvent, internal: &str) -> Vec<Notification> {
    let kind = event.event_type();
    let operators = || Recipient::Email(internal.to_string());

    match event {
        OrderEvent::PaymentConfirmed {
            order_id,
            channel,
            buyer_email,
            buyer_name,
            amount,
            ..
        } => vec![
            Notification::new(
                Recipient::Email(buyer_email.clone()),
                kind,
                format!("Payment received for order {order_id}"),
                format!(
                    "Hello {buyer_name},\n\nWe received your payment of {amount} for order \
                     {order_id}. We will let you know as soon as it ships."
                ),
            ),
            Notification::new(
                operators(),
                kind,
                format!("[orders] {order_id} paid"),
                format!("Order {order_id} paid {amount} via {}.", channel.as_str()),
            ),
        ],
        OrderEvent::ConfirmationRequested {
            order_id,
            artist_ids,
            titles,
            ..
        } => {
            let works = titles.join(", ");
            let subject = format!("Please confirm availability for order {order_id}");
            let body = format!(
                "Order {order_id} includes your work ({works}). Please confirm it is ready to ship."
            );
            if artist_ids.is_empty() {
                vec![Notification::new(operators(), kind, subject, body)]
            } else {
                artist_ids
                    .iter()
                    .map(|id| {
                        Notification::new(Recipient::Artist(*id), kind, subject.clone(), body.clone())
                    })
                    .collect()
            }
        }
        OrderEvent::OrderShipped {
            order_id,
            buyer_email,
            buyer_name,
            tracking_number,
            carrier,
            ..
        } => {
            let via = carrier
                .as_deref()
                .map(|c| format!(" with {c}"))
                .unwrap_or_default();
            vec![Notification::new(
                Recipient::Email(buyer_email.clone()),
                kind,
                format!("Order {order_id} has shipped"),
                format!(
                    "Hello {buyer_name},\n\nYour order {order_id} is on its way{via}. \
                     Tracking number: {tracking_number}."
                ),
            )]
        }
        OrderEvent::OrderCancelled {
            order_id,
            buyer_email,
            buyer_name,
            reason,
            refund_required,
            ..
        } => {
            let reason = reason.as_deref().unwrap_or("no reason given");
            let mut out = vec![Notification::new(
                Recipient::Email(buyer_email.clone()),
                kind,
                format!("Order {order_id} was cancelled"),
                format!("Hello {buyer_name},\n\nYour order {order_id} was cancelled: {reason}."),
            )];
            if *refund_required {
                out.push(Notification::new(
                    operators(),
                    kind,
                    format!("[orders] refund needed for {order_id}"),
                    format!("Order {order_id} was cancelled after payment ({reason}). Refund it manually."),
                ));
            }
            out
        }
        OrderEvent::GiftCardIssued {
            code,
            amount,
            recipient_email: Some(email),
            expires_at,
            ..
        } => vec![Notification::new(
            Recipient::Email(email.clone()),
            kind,
            "You received a gift card".to_string(),
            format!(
                "Your gift card {code} is worth {amount} and is valid until {}.",
                expires_at.format("%Y-%m-%d")
            ),
        )],
        OrderEvent::PaymentFailed {
            order_id, reason, ..
        } => vec![Notification::new(
            operators(),
            kind,
            format!("[orders] payment failed for {order_id}"),
            format!(
                "Gateway reported a failed payment for order {order_id}: {}.",
                reason.as_deref().unwrap_or("unknown")
            ),
        )],
        OrderEvent::OrderPlaced { .. }
        | OrderEvent::OrderConfirmed { .. }
        | OrderEvent::OrderDelivered { .. }
        | OrderEvent::GiftCardIssued { .. } => Vec::new(),
    }
}

//! Best-effort notifications, decoupled from the transactions that
//! trigger them.
//!
//! [`spawn_dispatcher`] subscribes to the [`EventBus`], renders each
//! committed [`OrderEvent`] into zero or more [`Notification`]s and hands
//! them to a [`Notifier`]. Delivery failures are logged and never reach
//! the request that produced the event.

pub mod templates;

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::domain::EventBus;
use crate::error::MarketError;

pub use templates::{Notification, Recipient, notifications_for};

/// Delivery transport for notifications (email, chat, ...).
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Delivers one notification.
    async fn send(&self, notification: &Notification) -> Result<(), MarketError>;
}

/// Notifier that writes every message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), MarketError> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = notification.kind,
            subject = %notification.subject,
            "notification sent"
        );
        Ok(())
    }
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), MarketError> {
        self.sent
            .lock()
            .map_err(|_| MarketError::Internal("outbox lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Spawns the background task that turns events into notifications.
///
/// The task ends when every sender of the bus has been dropped.
pub fn spawn_dispatcher(
    bus: &EventBus,
    notifier: Arc<dyn Notifier>,
    operators_email: String,
) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification dispatcher lagged, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            for notification in notifications_for(&event, &operators_email) {
                if let Err(e) = notifier.send(&notification).await {
                    tracing::warn!(
                        error = %e,
                        kind = notification.kind,
                        recipient = %notification.recipient,
                        order_id = ?event.order_id(),
                        "notification failed"
                    );
                }
            }
        }
        tracing::debug!("notification dispatcher stopped");
    })
}

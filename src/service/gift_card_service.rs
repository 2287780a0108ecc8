//! Gift card issuance, lookup and standalone redemption.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::gift_card::{generate_code, normalize_code};
use crate::domain::{Caller, EventBus, GiftCard, GiftCardApplication, OrderEvent};
use crate::error::MarketError;
use crate::payment::money;
use crate::persistence::MarketStore;

/// Attempts at finding an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Balance instrument operations.
#[derive(Debug, Clone)]
pub struct GiftCardService {
    store: Arc<dyn MarketStore>,
    event_bus: EventBus,
    validity: Duration,
    currency: String,
}

impl GiftCardService {
    /// Creates a new `GiftCardService` issuing cards in `currency`, valid
    /// for `validity`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        event_bus: EventBus,
        validity: Duration,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            event_bus,
            validity,
            currency: currency.into(),
        }
    }

    /// Issues a card with a fresh, collision-checked code. Admin only.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] for non-admin callers.
    /// - [`MarketError::Validation`] for a bad amount or recipient, or an
    ///   amount finer than the currency's minor unit.
    /// - [`MarketError::Internal`] if no free code was found.
    pub async fn issue(
        &self,
        caller: &Caller,
        amount: Decimal,
        recipient_email: Option<String>,
    ) -> Result<GiftCard, MarketError> {
        caller.require_admin()?;
        money::check_precision(amount, &self.currency)?;
        let now = Utc::now();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut rand::thread_rng());
            let card = GiftCard::issue(code, amount, recipient_email.clone(), self.validity, now)?;
            if self.store.insert_gift_card(&card).await? {
                tracing::info!(code = %card.code, amount = %card.amount, "gift card issued");
                self.event_bus.publish(OrderEvent::GiftCardIssued {
                    code: card.code.clone(),
                    amount: card.amount,
                    recipient_email: card.recipient_email.clone(),
                    expires_at: card.expires_at,
                    timestamp: now,
                });
                return Ok(card);
            }
            tracing::debug!(attempt, "gift card code collision, retrying");
        }
        Err(MarketError::Internal(
            "could not allocate a unique gift card code".to_string(),
        ))
    }

    /// Looks up a card by code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] for an unknown code.
    pub async fn get(&self, code: &str) -> Result<GiftCard, MarketError> {
        let code = normalize_code(code);
        self.store
            .gift_card(&code)
            .await?
            .ok_or_else(|| MarketError::not_found("gift card", code))
    }

    /// Debits `min(balance, order_total)` from the card atomically.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`], [`MarketError::Expired`],
    /// [`MarketError::FullyRedeemed`], or [`MarketError::Validation`] for a
    /// non-positive total or one finer than the currency's minor unit.
    pub async fn redeem(&self, code: &str, order_total: Decimal) -> Result<GiftCardApplication, MarketError> {
        money::check_precision(order_total, &self.currency)?;
        let code = normalize_code(code);
        let application = self
            .store
            .redeem_gift_card(&code, order_total, Utc::now())
            .await?;
        tracing::info!(
            code = %application.code,
            applied = %application.applied_amount,
            remaining = %application.remaining_balance,
            "gift card redeemed"
        );
        Ok(application)
    }
}

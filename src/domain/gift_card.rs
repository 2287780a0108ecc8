//! Gift cards: stored-value codes redeemable against order totals.
//!
//! Invariant: `0 <= balance <= amount` at all times. `is_redeemed` is set
//! exactly when the balance reaches zero.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::MarketError;
use crate::payment::money::MAX_SCALE;

/// Characters used in generated codes. No `0/O` or `1/I` lookalikes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of random groups in a code.
const CODE_GROUPS: usize = 3;

/// Characters per group.
const CODE_GROUP_LEN: usize = 4;

/// Largest face amount that can be issued.
pub const MAX_FACE_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Generates a human-readable code such as `GC-7KQM-R2XD-PW9A`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::from("GC");
    for _ in 0..CODE_GROUPS {
        code.push('-');
        for _ in 0..CODE_GROUP_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            if let Some(&byte) = CODE_ALPHABET.get(idx) {
                code.push(char::from(byte));
            }
        }
    }
    code
}

/// Canonical form of a user-typed code (trimmed, upper-case).
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// A stored-value card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GiftCard {
    /// Unique redemption code.
    pub code: String,
    /// Face amount at issuance.
    pub amount: Decimal,
    /// Remaining balance.
    pub balance: Decimal,
    /// Email the card was sent to.
    pub recipient_email: Option<String>,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// End of validity.
    pub expires_at: DateTime<Utc>,
    /// `true` once the balance reaches zero.
    pub is_redeemed: bool,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a card to a total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GiftCardApplication {
    /// Card code.
    pub code: String,
    /// Amount debited from the card.
    pub applied_amount: Decimal,
    /// Balance left on the card.
    pub remaining_balance: Decimal,
    /// Whether the card is now exhausted.
    pub is_redeemed: bool,
}

impl GiftCard {
    /// Issues a new card with `balance = amount`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the amount is not positive,
    /// exceeds [`MAX_FACE_AMOUNT`] or has more than two decimal places, or
    /// if the validity window is not positive.
    pub fn issue(
        code: String,
        amount: Decimal,
        recipient_email: Option<String>,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if amount <= Decimal::ZERO || amount > MAX_FACE_AMOUNT {
            return Err(MarketError::Validation(format!(
                "gift card amount must be in (0, {MAX_FACE_AMOUNT}], got {amount}"
            )));
        }
        if amount.normalize().scale() > MAX_SCALE {
            return Err(MarketError::Validation(format!(
                "gift card amount has more than {MAX_SCALE} decimal places: {amount}"
            )));
        }
        if validity <= Duration::zero() {
            return Err(MarketError::Validation(
                "gift card validity must be positive".to_string(),
            ));
        }
        if let Some(email) = &recipient_email
            && !email.contains('@')
        {
            return Err(MarketError::Validation(format!(
                "recipient is not an email address: {email}"
            )));
        }
        Ok(Self {
            code,
            amount,
            balance: amount,
            recipient_email,
            issued_at: now,
            expires_at: now + validity,
            is_redeemed: false,
            updated_at: now,
        })
    }

    /// Returns `true` once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Debits `min(balance, order_total)` from the card.
    ///
    /// The card is left untouched on error. Callers must run this under
    /// a row lock (or equivalent) so two redemptions cannot both read the
    /// same balance.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Expired`], [`MarketError::FullyRedeemed`], or
    /// [`MarketError::Validation`] for a non-positive total.
    pub fn apply(&mut self, order_total: Decimal, now: DateTime<Utc>) -> Result<GiftCardApplication, MarketError> {
        if self.is_expired(now) {
            return Err(MarketError::Expired(self.code.clone()));
        }
        if self.is_redeemed || self.balance <= Decimal::ZERO {
            return Err(MarketError::FullyRedeemed(self.code.clone()));
        }
        if order_total <= Decimal::ZERO {
            return Err(MarketError::Validation(format!(
                "order total must be positive, got {order_total}"
            )));
        }

        let applied_amount = self.balance.min(order_total);
        self.balance -= applied_amount;
        self.is_redeemed = self.balance.is_zero();
        self.updated_at = now;

        Ok(GiftCardApplication {
            code: self.code.clone(),
            applied_amount,
            remaining_balance: self.balance,
            is_redeemed: self.is_redeemed,
        })
    }

    /// Returns `amount` to the card, capped at the face amount.
    pub fn credit(&mut self, amount: Decimal, now: DateTime<Utc>) {
        self.balance = (self.balance + amount.max(Decimal::ZERO)).min(self.amount);
        self.is_redeemed = self.balance.is_zero();
        self.updated_at = now;
    }
}

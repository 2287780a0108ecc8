//! Gift card DTOs.

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `POST /gift-cards`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueGiftCardRequest {
    /// Face amount.
    pub amount: Decimal,
    /// Who receives the card by email.
    #[serde(default)]
    pub recipient_email: Option<String>,
}

/// Request body for `POST /gift-cards/{code}/redeem`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemGiftCardRequest {
    /// Order total to cover; at most this much is debited.
    pub order_total: Decimal,
}

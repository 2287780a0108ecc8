//! Gift card handlers: issue, look up, redeem.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{IssueGiftCardRequest, RedeemGiftCardRequest};
use crate::app_state::AppState;
use crate::domain::{Caller, GiftCard, GiftCardApplication};
use crate::error::{ErrorResponse, MarketError};

/// `POST /gift-cards` — Issue a new card.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins or an out-of-range amount.
#[utoipa::path(
    post,
    path = "/api/v1/gift-cards",
    tag = "Gift Cards",
    summary = "Issue gift card",
    request_body = IssueGiftCardRequest,
    responses(
        (status = 201, description = "Card issued", body = GiftCard),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn issue_gift_card(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<IssueGiftCardRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let card = state
        .gift_card_service
        .issue(&caller, req.amount, req.recipient_email)
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// `GET /gift-cards/{code}` — Balance and validity of a card.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] for an unknown code.
#[utoipa::path(
    get,
    path = "/api/v1/gift-cards/{code}",
    tag = "Gift Cards",
    summary = "Get gift card",
    params(("code" = String, Path, description = "Gift card code, case-insensitive")),
    responses(
        (status = 200, description = "Card detail", body = GiftCard),
        (status = 404, description = "Unknown code", body = ErrorResponse),
    )
)]
pub async fn get_gift_card(
    State(state): State<AppState>,
    _caller: Caller,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, MarketError> {
    let card = state.gift_card_service.get(&code).await?;
    Ok(Json(card))
}

/// `POST /gift-cards/{code}/redeem` — Debit up to `order_total`.
///
/// # Errors
///
/// Returns [`MarketError`] for an unknown, expired or exhausted card.
#[utoipa::path(
    post,
    path = "/api/v1/gift-cards/{code}/redeem",
    tag = "Gift Cards",
    summary = "Redeem gift card",
    description = "Debits min(balance, order_total) from the card and returns the applied amount and remaining balance.",
    params(("code" = String, Path, description = "Gift card code, case-insensitive")),
    request_body = RedeemGiftCardRequest,
    responses(
        (status = 200, description = "Card debited", body = GiftCardApplication),
        (status = 404, description = "Unknown code", body = ErrorResponse),
        (status = 410, description = "Card expired", body = ErrorResponse),
        (status = 422, description = "Card fully redeemed", body = ErrorResponse),
    )
)]
pub async fn redeem_gift_card(
    State(state): State<AppState>,
    _caller: Caller,
    Path(code): Path<String>,
    Json(req): Json<RedeemGiftCardRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let application = state
        .gift_card_service
        .redeem(&code, req.order_total)
        .await?;
    Ok(Json(application))
}

/// Gift card routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gift-cards", post(issue_gift_card))
        .route("/gift-cards/{code}", get(get_gift_card))
        .route("/gift-cards/{code}/redeem", post(redeem_gift_card))
}

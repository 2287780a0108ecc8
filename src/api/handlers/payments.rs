//! Payment gateway callback endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::{ErrorResponse, MarketError};
use crate::payment::SIGNATURE_HEADER;
use crate::service::CallbackOutcome;

/// `POST /payments/webhook` — Signed payment gateway callback.
///
/// The raw body is verified against the `payment-signature` header before
/// it is parsed. Every verified event is acknowledged with `200`, even
/// when it cannot be applied, so the gateway stops retrying.
///
/// # Errors
///
/// Returns [`MarketError::GatewayVerificationFailed`] (400) for a missing,
/// stale or invalid signature.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    summary = "Payment gateway callback",
    description = "Receives a signed payment event. Header `payment-signature: t=<unix>,v1=<hex hmac-sha256 of \"<t>.<body>\">`.",
    request_body(content = String, content_type = "application/json"),
    params(("payment-signature" = String, Header, description = "Gateway signature")),
    responses(
        (status = 200, description = "Event acknowledged", body = CallbackOutcome),
        (status = 400, description = "Signature verification failed", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, MarketError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state
        .payment_service
        .reconcile_callback(&body, signature)
        .await?;
    Ok(Json(outcome))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(payment_webhook))
}

//! Cart handlers: view, add, update, remove, clear and guest merge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{
    CartItemResponse, CartLineRequest, CartResponse, ClearCartResponse, MergeCartRequest,
    MergeCartResponse, UpdateCartItemRequest,
};
use crate::app_state::AppState;
use crate::domain::{Caller, CartItemId};
use crate::error::{ErrorResponse, MarketError};

/// `GET /cart` — The caller's cart.
///
/// # Errors
///
/// Returns [`MarketError`] on a missing identity or storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    tag = "Cart",
    summary = "Get cart",
    description = "Returns the cart of the calling user or guest session.",
    responses(
        (status = 200, description = "Current cart", body = CartResponse),
        (status = 401, description = "No identity", body = ErrorResponse),
    )
)]
pub async fn get_cart(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let items = state.cart_service.get(&caller).await?;
    Ok(Json(CartResponse::new(&caller.owner, items)))
}

/// `POST /cart/items` — Add a line, summing into an existing one.
///
/// # Errors
///
/// Returns [`MarketError`] for a malformed line, an unknown artwork or an
/// original that is out of stock.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    tag = "Cart",
    summary = "Add cart item",
    description = "Adds a line to the cart. A line with the same artwork, type and print size is merged by summing quantities.",
    request_body = CartLineRequest,
    responses(
        (status = 201, description = "Line stored", body = CartItemResponse),
        (status = 400, description = "Invalid line", body = ErrorResponse),
        (status = 404, description = "Unknown artwork", body = ErrorResponse),
        (status = 409, description = "Original out of stock", body = ErrorResponse),
    )
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CartLineRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let item = state.cart_service.add_item(&caller, req.into()).await?;
    Ok((StatusCode::CREATED, Json(CartItemResponse::from(item))))
}

/// `PATCH /cart/items/{id}` — Change a line's quantity.
///
/// # Errors
///
/// Returns [`MarketError`] for an unknown or foreign line, or an illegal
/// quantity.
#[utoipa::path(
    patch,
    path = "/api/v1/cart/items/{id}",
    tag = "Cart",
    summary = "Update cart item",
    params(("id" = CartItemId, Path, description = "Cart line identifier")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Line updated", body = CartItemResponse),
        (status = 400, description = "Invalid quantity", body = ErrorResponse),
        (status = 403, description = "Line belongs to another identity", body = ErrorResponse),
        (status = 404, description = "Line not found", body = ErrorResponse),
    )
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<CartItemId>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let item = state
        .cart_service
        .update_quantity(&caller, id, req.quantity)
        .await?;
    Ok(Json(CartItemResponse::from(item)))
}

/// `DELETE /cart/items/{id}` — Remove a line.
///
/// # Errors
///
/// Returns [`MarketError`] for an unknown or foreign line.
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    tag = "Cart",
    summary = "Remove cart item",
    params(("id" = CartItemId, Path, description = "Cart line identifier")),
    responses(
        (status = 204, description = "Line removed"),
        (status = 403, description = "Line belongs to another identity", body = ErrorResponse),
        (status = 404, description = "Line not found", body = ErrorResponse),
    )
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<CartItemId>,
) -> Result<impl IntoResponse, MarketError> {
    state.cart_service.remove_item(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /cart` — Empty the cart.
///
/// # Errors
///
/// Returns [`MarketError`] on a missing identity or storage failure.
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    tag = "Cart",
    summary = "Clear cart",
    responses(
        (status = 200, description = "Cart emptied", body = ClearCartResponse),
    )
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let removed = state.cart_service.clear(&caller).await?;
    Ok(Json(ClearCartResponse { removed }))
}

/// `POST /cart/merge` — Fold a guest session's cart into the user's.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] for guest callers.
#[utoipa::path(
    post,
    path = "/api/v1/cart/merge",
    tag = "Cart",
    summary = "Merge guest cart",
    description = "Folds the lines of an anonymous session into the authenticated user's cart. Guest lines are consumed, so repeating the call changes nothing.",
    request_body = MergeCartRequest,
    responses(
        (status = 200, description = "Merge report", body = MergeCartResponse),
        (status = 403, description = "Caller is not an authenticated user", body = ErrorResponse),
    )
)]
pub async fn merge_guest_cart(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<MergeCartRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let report = state
        .cart_service
        .merge_guest_cart(&caller, &req.guest_session)
        .await?;
    Ok(Json(MergeCartResponse::new(&caller.owner, report)))
}

/// Cart routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_cart_item))
        .route(
            "/cart/items/{id}",
            patch(update_cart_item).delete(remove_cart_item),
        )
        .route("/cart/merge", post(merge_guest_cart))
}

//! Order handlers: checkout, queries and lifecycle transitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    CancelOrderRequest, ConfirmPaymentRequest, CreateOrderRequest, ListOrdersParams,
    OrderListResponse, OrderNotesRequest, OrderResponse, OrderSummary, PaginationMeta,
    PaginationParams, ShipOrderRequest,
};
use crate::app_state::AppState;
use crate::domain::{Caller, OrderId, Owner};
use crate::error::{ErrorResponse, MarketError};
use crate::service::{OrderQuery, PlaceOrder};

/// `POST /orders` — Place an order from the cart or an explicit item list.
///
/// # Errors
///
/// Returns [`MarketError`] for an empty or invalid order, an unknown
/// artwork, a sold original or an unusable gift card.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "Orders",
    summary = "Create order",
    description = "Materializes the cart (or the given items) into a PENDING order. Prices are snapshotted, originals are taken out of stock and the gift card is debited in one atomic step.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Invalid order", body = ErrorResponse),
        (status = 404, description = "Unknown artwork or gift card", body = ErrorResponse),
        (status = 409, description = "Original out of stock", body = ErrorResponse),
        (status = 410, description = "Gift card expired", body = ErrorResponse),
        (status = 422, description = "Gift card fully redeemed", body = ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let input = PlaceOrder {
        items: req
            .items
            .map(|items| items.into_iter().map(Into::into).collect()),
        shipping: req.shipping,
        payment_method: req.payment_method,
        gift_card_code: req.gift_card_code,
    };
    let order = state.order_service.create_order(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// `GET /orders` — List orders, newest first.
///
/// Non-admin callers only see their own orders.
///
/// # Errors
///
/// Returns [`MarketError`] for a malformed owner filter.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "Orders",
    summary = "List orders",
    params(ListOrdersParams),
    responses(
        (status = 200, description = "Paginated order list", body = OrderListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ListOrdersParams>,
) -> Result<impl IntoResponse, MarketError> {
    let pagination = PaginationParams {
        page: params.page,
        per_page: params.per_page,
    }
    .clamped();
    let owner = params
        .owner
        .as_deref()
        .map(str::parse::<Owner>)
        .transpose()?;

    let (orders, total) = state
        .order_service
        .list_orders(
            &caller,
            OrderQuery {
                status: params.status,
                owner,
                page: pagination.page,
                per_page: pagination.per_page,
            },
        )
        .await?;

    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderSummary::from).collect(),
        pagination: PaginationMeta::new(pagination, total),
    }))
}

/// `GET /orders/{id}` — Order detail.
///
/// # Errors
///
/// Returns [`MarketError`] for an unknown order or a caller who is neither
/// its owner nor an admin.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    summary = "Get order",
    params(("id" = OrderId, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order detail", body = OrderResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.get_order(&caller, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/request-confirmation` — Ask the artist to confirm.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins, unknown orders or an order that
/// is not `PAID`.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/request-confirmation",
    tag = "Orders",
    summary = "Request artist confirmation",
    params(("id" = OrderId, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order awaiting confirmation", body = OrderResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
    )
)]
pub async fn request_confirmation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.request_confirmation(&caller, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/confirm` — Artist or admin confirms availability.
///
/// # Errors
///
/// Returns [`MarketError`] when the caller may not confirm or the order is
/// not awaiting confirmation.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/confirm",
    tag = "Orders",
    summary = "Confirm order",
    params(("id" = OrderId, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order confirmed", body = OrderResponse),
        (status = 403, description = "Not an admin or the fulfilling artist", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
    )
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.confirm(&caller, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/ship` — Hand the order to a carrier.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins, a blank tracking number or an
/// order that is not `CONFIRMED`.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/ship",
    tag = "Orders",
    summary = "Ship order",
    params(("id" = OrderId, Path, description = "Order identifier")),
    request_body = ShipOrderRequest,
    responses(
        (status = 200, description = "Order shipped", body = OrderResponse),
        (status = 400, description = "Missing tracking number", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
    )
)]
pub async fn ship_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(req): Json<ShipOrderRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state
        .order_service
        .ship(&caller, id, req.tracking_number, req.carrier, req.notes)
        .await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/deliver` — Mark the order delivered.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins or an order that is not
/// `SHIPPED`.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/deliver",
    tag = "Orders",
    summary = "Mark order delivered",
    params(("id" = OrderId, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Order delivered", body = OrderResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
    )
)]
pub async fn deliver_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.deliver(&caller, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/cancel` — Cancel a non-terminal order.
///
/// # Errors
///
/// Returns [`MarketError`] for callers other than the owner or an admin,
/// or an order that is already `DELIVERED` or `CANCELLED`.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    tag = "Orders",
    summary = "Cancel order",
    description = "Cancels the order, puts its originals back in stock and credits back any gift card debit.",
    params(("id" = OrderId, Path, description = "Order identifier")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 409, description = "Illegal transition", body = ErrorResponse),
    )
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.cancel(&caller, id, req.reason).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `PUT /orders/{id}/notes` — Replace operator notes.
///
/// # Errors
///
/// Returns [`MarketError`] for non-admins, unknown orders or oversized
/// notes.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/notes",
    tag = "Orders",
    summary = "Set order notes",
    params(("id" = OrderId, Path, description = "Order identifier")),
    request_body = OrderNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = OrderResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    )
)]
pub async fn set_order_notes(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(req): Json<OrderNotesRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state.order_service.set_notes(&caller, id, req.notes).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// `POST /orders/{id}/confirm-payment` — Operator confirms a bank transfer.
///
/// # Errors
///
/// Returns [`MarketError::InvalidState`] if the order is not `PENDING` or
/// is paid through the gateway.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/confirm-payment",
    tag = "Payments",
    summary = "Confirm manual payment",
    params(("id" = OrderId, Path, description = "Order identifier")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Order paid", body = OrderResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 409, description = "Order not payable manually", body = ErrorResponse),
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let order = state
        .payment_service
        .confirm_manual_payment(&caller, id, req.reference)
        .await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Order routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route(
            "/orders/{id}/request-confirmation",
            post(request_confirmation),
        )
        .route("/orders/{id}/confirm", post(confirm_order))
        .route("/orders/{id}/ship", post(ship_order))
        .route("/orders/{id}/deliver", post(deliver_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/notes", put(set_order_notes))
        .route("/orders/{id}/confirm-payment", post(confirm_payment))
}

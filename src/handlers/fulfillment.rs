use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/seller/orders", get(seller_orders))
        .route("/seller/orders/:order_id/send", put(mark_order_items_sent))
        .route("/seller/items/:item_id/send", put(mark_item_sent))
}

/// Orders containing at least one of the seller's products. Items belonging
/// to other sellers are filtered out of each order.
#[utoipa::path(
    get,
    path = "/api/v1/seller/orders",
    summary = "List seller's sales",
    responses(
        (status = 200, description = "Orders with the seller's items"),
        (status = 403, description = "Caller is not a seller", body = crate::errors::ErrorResponse),
    ),
    tag = "seller"
)]
pub async fn seller_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_for_seller(&principal).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Mark a single item sent. Idempotent.
#[utoipa::path(
    put,
    path = "/api/v1/seller/items/{item_id}/send",
    summary = "Mark item sent",
    params(("item_id" = Uuid, Path, description = "Order item id")),
    responses(
        (status = 200, description = "Item marked sent (no-op when already sent)"),
        (status = 403, description = "Item belongs to another seller", body = crate::errors::ErrorResponse),
    ),
    tag = "seller"
)]
pub async fn mark_item_sent(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state
        .services
        .fulfillment
        .mark_item_sent(&principal, item_id)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Mark every item of the seller's in an order as sent.
#[utoipa::path(
    put,
    path = "/api/v1/seller/orders/{order_id}/send",
    summary = "Mark seller's items in an order sent",
    params(("order_id" = Uuid, Path, description = "Internal order id")),
    responses(
        (status = 200, description = "Seller's items marked sent"),
        (status = 403, description = "No items from this seller in the order", body = crate::errors::ErrorResponse),
    ),
    tag = "seller"
)]
pub async fn mark_order_items_sent(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state
        .services
        .fulfillment
        .mark_seller_items_sent(&principal, order_id)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

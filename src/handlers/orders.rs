use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Principal;
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::services::orders::{AdminOrderUpdate, CreateOrderInput};
use crate::{ApiResponse, AppState, ListQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:order_number", get(get_order))
        .route("/orders/:order_number/confirm", post(confirm_receipt))
        .route("/admin/orders/:order_id", put(admin_update_order))
}

/// Create an order from an explicit item list.
///
/// The caller supplies unit prices from its own catalog read; the engine
/// re-validates them against the live catalog and fails with 422 on drift.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Empty item list or invalid shipping data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number allocation kept racing, retry the request", body = crate::errors::ErrorResponse),
        (status = 422, description = "A submitted price no longer matches the catalog", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    Json(input): Json<CreateOrderInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let commission = state.services.settings.commission_percent().await?;
    let created = state
        .services
        .orders
        .create_order(&principal, input, commission)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Orders visible to the caller: admins see all, customers their own.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses((status = 200, description = "Orders listed")),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .orders
        .list(&principal, query.page, query.per_page)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_number}",
    summary = "Get order by number",
    params(("order_number" = String, Path, description = "Public order number, e.g. ORD-20250301-0001")),
    responses(
        (status = 200, description = "Order retrieved"),
        (status = 403, description = "Not the order's owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order number", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_by_number(&principal, &order_number)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Customer confirms receipt of a shipped order (`shipped → completed`).
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_number}/confirm",
    summary = "Confirm receipt",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order completed"),
        (status = 422, description = "Order is not in the shipped status", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn confirm_receipt(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .order_status
        .confirm_receipt(&principal, &order_number)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct AdminOrderUpdateBody {
    status: Option<OrderStatus>,
    tracking_number: Option<String>,
    notes: Option<String>,
    paid: Option<bool>,
}

/// Admin operational edit: status override plus tracking/notes/paid.
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{order_id}",
    summary = "Admin order update",
    request_body = AdminOrderUpdateBody,
    params(("order_id" = Uuid, Path, description = "Internal order id")),
    responses(
        (status = 200, description = "Order updated"),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn admin_update_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    Json(body): Json<AdminOrderUpdateBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut order = state
        .services
        .orders
        .admin_update(
            &principal,
            order_id,
            AdminOrderUpdate {
                tracking_number: body.tracking_number,
                notes: body.notes,
                paid: body.paid,
            },
        )
        .await?;

    if let Some(status) = body.status {
        order = state
            .services
            .order_status
            .admin_set_status(&principal, order_id, status)
            .await?;
    }

    Ok(Json(ApiResponse::success(order)))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::ServiceError;
use crate::services::orders::{CreateOrderInput, ShippingDetails};
use crate::{ApiResponse, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:item_id", put(update_item))
        .route("/cart/items/:item_id", delete(remove_item))
        .route("/checkout", post(checkout))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "View cart",
    responses((status = 200, description = "Current cart with live catalog prices")),
    tag = "cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.carts.view(principal.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct AddItemBody {
    product_id: Uuid,
    quantity: i32,
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    summary = "Add product to cart",
    request_body = AddItemBody,
    responses(
        (status = 200, description = "Item added, quantities merged when already present"),
        (status = 404, description = "Unknown or unpublished product", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<AddItemBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .add_item(principal.user_id, body.product_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct UpdateItemBody {
    quantity: i32,
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    summary = "Change cart line quantity",
    request_body = UpdateItemBody,
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses((status = 200, description = "Quantity updated")),
    tag = "cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateItemBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .update_item(principal.user_id, item_id, body.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    summary = "Remove cart line",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses((status = 200, description = "Item removed")),
    tag = "cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .carts
        .remove_item(principal.user_id, item_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct CheckoutBody {
    shipping: ShippingDetails,
    payment_reference: Option<String>,
    #[serde(default)]
    paid: bool,
}

/// Convert the stored cart into an order. Prices come from the catalog at
/// checkout time, so the price re-validation inside order creation cannot
/// fail here unless the catalog changes mid-request.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    summary = "Checkout the cart",
    request_body = CheckoutBody,
    responses(
        (status = 201, description = "Order created from cart, cart emptied"),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let lines = state.services.carts.order_lines(principal.user_id).await?;
    let commission = state.services.settings.commission_percent().await?;

    let created = state
        .services
        .orders
        .create_order(
            &principal,
            CreateOrderInput {
                lines,
                shipping: body.shipping,
                payment_reference: body.payment_reference,
                paid: body.paid,
            },
            commission,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

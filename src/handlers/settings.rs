use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{permissions, Principal};
use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/admin/settings/commission",
        get(get_commission).put(set_commission),
    )
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
struct CommissionBody {
    commission: Decimal,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/settings/commission",
    summary = "Current commission percentage",
    responses((status = 200, description = "Commission percentage")),
    tag = "admin"
)]
pub async fn get_commission(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    if !permissions::can_edit_settings(&principal) {
        return Err(ServiceError::Forbidden("admin access required".to_string()));
    }
    let commission = state.services.settings.commission_percent().await?;
    Ok(Json(ApiResponse::success(CommissionBody { commission })))
}

/// Change the marketplace commission. Affects only orders created after the
/// write; existing orders keep their totals.
#[utoipa::path(
    put,
    path = "/api/v1/admin/settings/commission",
    summary = "Update commission percentage",
    request_body = CommissionBody,
    responses(
        (status = 200, description = "Commission updated"),
        (status = 400, description = "Percentage out of range", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn set_commission(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CommissionBody>,
) -> Result<impl IntoResponse, ServiceError> {
    if !permissions::can_edit_settings(&principal) {
        return Err(ServiceError::Forbidden("admin access required".to_string()));
    }
    let commission = state
        .services
        .settings
        .set_commission_percent(body.commission)
        .await?;
    Ok(Json(ApiResponse::success(CommissionBody { commission })))
}

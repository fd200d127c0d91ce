use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::ServiceError;
use crate::services::verification::SellerApplication;
use crate::{ApiResponse, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/verification/apply", post(apply))
        .route("/verification/revert", post(revert))
        .route("/admin/verifications", get(list_pending))
        .route("/admin/verifications/:user_id", put(review))
}

/// Body of a seller-role request. The application fields are optional so a
/// previously approved seller can re-request with an empty object; everyone
/// else must include them.
#[derive(Debug, Deserialize, ToSchema)]
struct ApplyBody {
    #[serde(flatten)]
    application: Option<SellerApplication>,
}

/// Request the seller role. Previously approved sellers are restored without
/// review; everyone else enters the pending queue.
///
/// The response carries `sign_out: true` whenever the role changed, telling
/// the session layer to invalidate the caller's token.
#[utoipa::path(
    post,
    path = "/api/v1/verification/apply",
    summary = "Request seller role",
    request_body = ApplyBody,
    responses(
        (status = 200, description = "Application accepted or seller role restored"),
        (status = 400, description = "Field-level validation failures", body = crate::errors::ErrorResponse),
        (status = 409, description = "INN already registered by another account", body = crate::errors::ErrorResponse),
    ),
    tag = "verification"
)]
pub async fn apply(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<ApplyBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .verification
        .request_seller(principal.user_id, body.application)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Voluntarily give up the seller role. Verification state stays intact so a
/// later re-request takes the fast path.
#[utoipa::path(
    post,
    path = "/api/v1/verification/revert",
    summary = "Revert to customer",
    responses((status = 200, description = "Role reverted; sign_out indicates session invalidation")),
    tag = "verification"
)]
pub async fn revert(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .verification
        .revert_to_customer(principal.user_id)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/verifications",
    summary = "Pending applications",
    responses(
        (status = 200, description = "Users awaiting review, oldest first"),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn list_pending(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ServiceError> {
    let users = state.services.verification.list_pending(&principal).await?;
    Ok(Json(ApiResponse::success(users)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ReviewBody {
    Approve,
    Reject { rejection_reason: String },
}

/// Admin approves or rejects a pending application.
#[utoipa::path(
    put,
    path = "/api/v1/admin/verifications/{user_id}",
    summary = "Review application",
    request_body = ReviewBody,
    params(("user_id" = Uuid, Path, description = "Applicant user id")),
    responses(
        (status = 200, description = "Application reviewed"),
        (status = 403, description = "Admin access required", body = crate::errors::ErrorResponse),
        (status = 422, description = "Application is not pending", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn review(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = match body {
        ReviewBody::Approve => state.services.verification.approve(&principal, user_id).await?,
        ReviewBody::Reject { rejection_reason } => {
            state
                .services
                .verification
                .reject(&principal, user_id, &rejection_reason)
                .await?
        }
    };
    Ok(Json(ApiResponse::success(outcome)))
}

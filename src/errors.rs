use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Standard error envelope returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Order ORD-20250301-0042 not found",
    "fields": null,
    "timestamp": "2025-03-01T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Per-field validation failures, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldViolation>>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// A single field-level validation failure.
///
/// Validation errors are always reported per-field so the caller can highlight
/// the offending input instead of showing one opaque message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    /// Name of the offending field (e.g. "inn", "passport_number")
    pub field: String,
    /// Why the value was rejected
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    ValidationFailed(Vec<FieldViolation>),

    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Price mismatch for product {product_id}: expected {expected}, got {submitted}")]
    PriceMismatch {
        product_id: uuid::Uuid,
        expected: rust_decimal::Decimal,
        submitted: rust_decimal::Decimal,
    },

    #[error("Order number sequence exhausted for {0}")]
    SequenceExhausted(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_violations(&errors, "", &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::ValidationFailed(fields)
    }
}

// Flattens nested validator output (structs, lists) into dotted field paths.
fn collect_violations(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut Vec<FieldViolation>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            (*field).to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(violations) => {
                for violation in violations {
                    let message = violation
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {path}"));
                    out.push(FieldViolation::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_violations(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_violations(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

impl ServiceError {
    /// Single-field validation failure shortcut.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::ValidationFailed(vec![FieldViolation::new(field, message)])
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::SequenceExhausted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PriceMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Returns the message suitable for HTTP responses. Internal errors get a
    /// generic message so implementation details never leak to clients.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::SequenceExhausted(_) => "Order numbering unavailable".to_string(),
            Self::ValidationFailed(_) => "Validation failed".to_string(),
            _ => self.to_string(),
        }
    }

    fn field_violations(&self) -> Option<Vec<FieldViolation>> {
        match self {
            Self::ValidationFailed(fields) => Some(fields.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            fields: self.field_violations(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

use crate::errors::ApiError;
use crate::handlers::common::{is_false, map_service_error};
use crate::handlers::orders::OrderResponse;
use crate::handlers::AppState;
use crate::services::orders::VerifyOutcome;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyPaymentQuery {
    /// Provider-side payment session id
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResponse>,
    #[serde(skip_serializing_if = "is_false")]
    pub already_processed: bool,
    /// Provider status when the payment has not completed yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Confirms a provider payment and finalizes the checkout behind it.
///
/// Replays answer 200 with the existing order and `already_processed: true`.
/// A session the customer has not paid yet is not an error; the response says
/// so and the checkout stays pending.
#[utoipa::path(
    get,
    path = "/api/v1/payment/verify",
    params(VerifyPaymentQuery),
    responses(
        (status = 200, description = "Verification result", body = VerifyPaymentResponse),
        (status = 400, description = "Missing session_id", body = crate::errors::ErrorResponse),
        (status = 404, description = "No session for this payment", body = crate::errors::ErrorResponse),
        (status = 410, description = "Session expired", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyPaymentQuery>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let session_id = query
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::ValidationError("Missing session_id".to_string()))?;

    let outcome = state
        .services
        .orders
        .verify_payment(session_id)
        .await
        .map_err(map_service_error)?;

    match outcome {
        VerifyOutcome::Finalized(finalization) => Ok(Json(VerifyPaymentResponse {
            success: true,
            order: Some(OrderResponse::from_model(&finalization.order)?),
            already_processed: finalization.already_processed,
            status: None,
            message: None,
        })),
        VerifyOutcome::NotCompleted { status } => Ok(Json(VerifyPaymentResponse {
            success: false,
            order: None,
            already_processed: false,
            status: Some(status),
            message: Some("Payment not completed".to_string()),
        })),
    }
}

use crate::entities::coupon::DiscountType;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, validate_input};
use crate::handlers::AppState;
use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"code": "WILLKOMMEN10", "subtotal": "100.00"}))]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
    #[schema(value_type = String, example = "100.00")]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub code: String,
    pub discount_type: DiscountType,
    #[schema(value_type = String, example = "10")]
    pub discount_value: Decimal,
    #[schema(value_type = String, example = "10.00")]
    pub discount_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Pre-flight coupon check. Unlike apply-at-checkout, this endpoint fails
/// hard with the customer-facing rejection reason.
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon applies", body = ValidateCouponResponse),
        (status = 400, description = "Coupon conditions reject the cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown coupon code", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, ApiError> {
    validate_input(&payload)?;

    let evaluation = state
        .services
        .coupons
        .validate_strict(&payload.code, payload.subtotal)
        .await
        .map_err(map_service_error)?;

    Ok(Json(ValidateCouponResponse {
        valid: true,
        code: evaluation.code,
        discount_type: evaluation.discount_type,
        discount_value: evaluation.discount_value,
        discount_amount: evaluation.discount_amount,
        description: evaluation.description,
    }))
}

use crate::entities::checkout_session::LineItem;
use crate::entities::order::{self, OrderStatus, PaymentStatus};
use crate::errors::ApiError;
use crate::handlers::common::map_service_error;
use crate::handlers::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Finalized order as the storefront success page consumes it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    #[schema(example = "HB260829A1B2C3")]
    pub tracking_number: String,
    #[schema(example = "RE-2026-00042")]
    pub invoice_number: String,

    pub customer_name: String,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,

    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub shipping_country: String,

    pub items: Vec<LineItem>,

    #[schema(value_type = String, example = "39.80")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "5.90")]
    pub shipping_cost: Decimal,
    #[schema(value_type = String, example = "3.98")]
    pub discount_amount: Decimal,
    #[schema(value_type = String, example = "41.72")]
    pub total_amount: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    pub created_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_model(order: &order::Model) -> Result<Self, ApiError> {
        let items = order.line_items().map_err(|e| {
            ApiError::ServiceError(crate::errors::ServiceError::SerializationError(
                e.to_string(),
            ))
        })?;
        Ok(Self {
            id: order.id,
            tracking_number: order.tracking_number.clone(),
            invoice_number: order.invoice_number.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            shipping_address: order.shipping_address.clone(),
            shipping_city: order.shipping_city.clone(),
            shipping_postal: order.shipping_postal.clone(),
            shipping_country: order.shipping_country.clone(),
            items,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            coupon_code: order.coupon_code.clone(),
            status: order.status,
            payment_status: order.payment_status,
            created_at: order.created_at,
        })
    }
}

/// Status-only view of an order for the public tracking page. Customer and
/// payment details stay off this surface; anyone holding the tracking number
/// can call it.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingResponse {
    #[schema(example = "HB260829A1B2C3")]
    pub tracking_number: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&order::Model> for TrackingResponse {
    fn from(order: &order::Model) -> Self {
        Self {
            tracking_number: order.tracking_number.clone(),
            status: order.status,
            created_at: order.created_at,
        }
    }
}

/// Public order lookup by tracking number, case-insensitive on input.
#[utoipa::path(
    get,
    path = "/api/v1/tracking/{tracking_number}",
    params(
        ("tracking_number" = String, Path, description = "Tracking number, e.g. HB260829A1B2C3")
    ),
    responses(
        (status = 200, description = "Order found", body = TrackingResponse),
        (status = 404, description = "Unknown tracking number", body = crate::errors::ErrorResponse)
    ),
    tag = "Tracking"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<Json<TrackingResponse>, ApiError> {
    let order = state
        .services
        .orders
        .find_by_tracking(&tracking_number)
        .await
        .map_err(map_service_error)?;

    Ok(Json(TrackingResponse::from(&order)))
}

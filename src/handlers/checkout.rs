use crate::entities::checkout_session::LineItem;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, validate_input};
use crate::handlers::orders::OrderResponse;
use crate::handlers::AppState;
use crate::services::checkout::{CartItemInput, CreateCheckoutInput};
use crate::services::payments::{display_test_cards, TestCard};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "customer_name": "Anna Gruber",
    "customer_email": "anna@example.com",
    "shipping_address": "Hauptstraße 1",
    "shipping_city": "Wien",
    "shipping_postal": "1010",
    "shipping_country": "Österreich",
    "items": [{"product_id": "550e8400-e29b-41d4-a716-446655440000", "quantity": 2}],
    "coupon_code": "WILLKOMMEN10"
}))]
pub struct CreateCheckoutRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub customer_email: String,
    pub customer_phone: Option<String>,

    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "Shipping city is required"))]
    pub shipping_city: String,
    #[validate(length(min = 1, message = "Shipping postal code is required"))]
    pub shipping_postal: String,
    #[validate(length(min = 1, message = "Shipping country is required"))]
    pub shipping_country: String,

    #[validate(length(min = 1, message = "Cart must contain at least one item"))]
    pub items: Vec<CartItemRequest>,

    pub coupon_code: Option<String>,
    /// Storefront origin used to build post-payment redirect URLs
    pub origin_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCheckoutResponse {
    pub session_token: String,
    pub checkout_url: String,
    #[schema(value_type = String, example = "41.72")]
    pub total_amount: Decimal,
    pub demo_mode: bool,
}

/// Prices a cart and opens a pending checkout session.
#[utoipa::path(
    post,
    path = "/api/v1/orders/create-checkout",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Session created", body = CreateCheckoutResponse),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    validate_input(&payload)?;

    let input = CreateCheckoutInput {
        customer_name: payload.customer_name,
        customer_email: payload.customer_email,
        customer_phone: payload.customer_phone,
        shipping_address: payload.shipping_address,
        shipping_city: payload.shipping_city,
        shipping_postal: payload.shipping_postal,
        shipping_country: payload.shipping_country,
        items: payload
            .items
            .into_iter()
            .map(|item| CartItemInput {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect(),
        coupon_code: payload.coupon_code,
        origin_url: payload.origin_url,
    };

    let created = state
        .services
        .checkout
        .create_checkout(input)
        .await
        .map_err(map_service_error)?;

    Ok(Json(CreateCheckoutResponse {
        session_token: created.session_token,
        checkout_url: created.checkout_url,
        total_amount: created.total_amount,
        demo_mode: created.demo_mode,
    }))
}

/// Pending session as re-displayed by the storefront checkout page
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_token: String,

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

    pub is_demo: bool,
    pub expires_at: DateTime<Utc>,
}

/// Re-displays a pending checkout session.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/session/{token}",
    params(
        ("token" = String, Path, description = "Opaque session token")
    ),
    responses(
        (status = 200, description = "Pending session", body = SessionResponse),
        (status = 404, description = "Unknown or completed token", body = crate::errors::ErrorResponse),
        (status = 410, description = "Session expired", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .services
        .checkout
        .get_pending_session(&token)
        .await
        .map_err(map_service_error)?;

    let items = session
        .line_items()
        .map_err(|e| map_service_error(crate::errors::ServiceError::from(e)))?;

    Ok(Json(SessionResponse {
        session_token: session.session_token,
        customer_name: session.customer_name,
        customer_email: session.customer_email,
        customer_phone: session.customer_phone,
        shipping_address: session.shipping_address,
        shipping_city: session.shipping_city,
        shipping_postal: session.shipping_postal,
        shipping_country: session.shipping_country,
        items,
        subtotal: session.subtotal,
        shipping_cost: session.shipping_cost,
        discount_amount: session.discount_amount,
        total_amount: session.total_amount,
        coupon_code: session.coupon_code,
        is_demo: session.is_demo,
        expires_at: session.expires_at,
    }))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DemoCompleteRequest {
    #[validate(length(min = 1, message = "Session token is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "Card number is required"))]
    pub card_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DemoCompleteResponse {
    pub success: bool,
    pub order: OrderResponse,
    pub demo_mode: bool,
    #[serde(skip_serializing_if = "crate::handlers::common::is_false")]
    pub already_processed: bool,
}

/// Finalizes a demo-mode payment with a test card.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/demo/complete",
    request_body = DemoCompleteRequest,
    responses(
        (status = 200, description = "Order finalized", body = DemoCompleteResponse),
        (status = 400, description = "Invalid test card", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown session token", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session completed without an order", body = crate::errors::ErrorResponse),
        (status = 410, description = "Session expired", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn complete_demo_checkout(
    State(state): State<AppState>,
    Json(payload): Json<DemoCompleteRequest>,
) -> Result<Json<DemoCompleteResponse>, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .orders
        .complete_demo(&payload.token, &payload.card_number)
        .await
        .map_err(map_service_error)?;

    Ok(Json(DemoCompleteResponse {
        success: true,
        order: OrderResponse::from_model(&outcome.order)?,
        demo_mode: true,
        already_processed: outcome.already_processed,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutStatusResponse {
    pub demo_mode: bool,
    pub provider_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cards: Option<Vec<TestCard>>,
}

/// Payment-mode discovery for the storefront.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/status",
    responses(
        (status = 200, description = "Payment mode", body = CheckoutStatusResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout_status(State(state): State<AppState>) -> Json<CheckoutStatusResponse> {
    let demo_mode = state.services.payment_provider.is_demo();

    Json(CheckoutStatusResponse {
        demo_mode,
        provider_configured: !demo_mode,
        test_cards: demo_mode.then(display_test_cards),
    })
}

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Checkout API

Backend for an online shop's checkout-to-fulfillment pipeline: priced
checkout sessions, coupon and shipping evaluation, idempotent order
finalization with inventory decrement, and public order tracking.

## Checkout flow

1. `POST /orders/create-checkout` prices the cart and opens a pending,
   time-boxed session.
2. The customer pays at the hosted provider checkout — or, in demo mode,
   completes locally via `POST /checkout/demo/complete` with a test card.
3. `GET /payment/verify` confirms a provider payment and finalizes the
   order. Both finalization paths are idempotent; replays answer with the
   existing order and `already_processed: true`.

All endpoints are public; there is no authentication layer.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Checkout session lifecycle"),
        (name = "Payments", description = "Payment verification and finalization"),
        (name = "Coupons", description = "Coupon pre-flight validation"),
        (name = "Shipping", description = "Shipping rate table"),
        (name = "Tracking", description = "Public order lookup")
    ),
    paths(
        crate::handlers::checkout::create_checkout,
        crate::handlers::checkout::get_checkout_session,
        crate::handlers::checkout::complete_demo_checkout,
        crate::handlers::checkout::checkout_status,
        crate::handlers::payments::verify_payment,
        crate::handlers::coupons::validate_coupon,
        crate::handlers::shipping::list_shipping_rates,
        crate::handlers::orders::track_order,
    ),
    components(
        schemas(
            crate::handlers::checkout::CreateCheckoutRequest,
            crate::handlers::checkout::CartItemRequest,
            crate::handlers::checkout::CreateCheckoutResponse,
            crate::handlers::checkout::SessionResponse,
            crate::handlers::checkout::DemoCompleteRequest,
            crate::handlers::checkout::DemoCompleteResponse,
            crate::handlers::checkout::CheckoutStatusResponse,
            crate::handlers::payments::VerifyPaymentResponse,
            crate::handlers::coupons::ValidateCouponRequest,
            crate::handlers::coupons::ValidateCouponResponse,
            crate::handlers::shipping::ShippingRateResponse,
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::TrackingResponse,
            crate::entities::checkout_session::LineItem,
            crate::entities::coupon::DiscountType,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::services::payments::TestCard,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_checkout_surface() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/orders/create-checkout"));
        assert!(json.contains("/api/v1/payment/verify"));
        assert!(json.contains("/api/v1/tracking/{tracking_number}"));
    }
}

//! Integration tests for the strict coupon validation endpoint and its
//! customer-facing German rejection messages.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{body_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::Set;
use serde_json::json;
use storefront_api::entities::coupon::DiscountType;

async fn validate(app: &TestApp, code: &str, subtotal: &str) -> axum::response::Response {
    app.request(
        Method::POST,
        "/api/v1/coupons/validate",
        Some(json!({"code": code, "subtotal": subtotal})),
    )
    .await
}

#[tokio::test]
async fn valid_percent_coupon_reports_discount() {
    let app = TestApp::new().await;
    app.seed_coupon("WILLKOMMEN10", DiscountType::Percent, dec!(10), |c| {
        c.description = Set(Some("10% Willkommensrabatt".to_string()));
    })
    .await;

    let response = validate(&app, "WILLKOMMEN10", "100.00").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["code"], json!("WILLKOMMEN10"));
    assert_eq!(body["discount_type"], json!("percent"));
    assert_eq!(body["discount_amount"], json!("10.00"));
    assert_eq!(body["description"], json!("10% Willkommensrabatt"));
}

#[tokio::test]
async fn coupon_codes_match_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_coupon("WILLKOMMEN10", DiscountType::Percent, dec!(10), |_| {})
        .await;

    let response = validate(&app, "willkommen10", "50.00").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_code_answers_not_found_in_german() {
    let app = TestApp::new().await;

    let response = validate(&app, "GIBTSNICHT", "100.00").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Ungültiger Gutscheincode"));
}

#[tokio::test]
async fn not_yet_active_coupon_is_rejected() {
    let app = TestApp::new().await;
    app.seed_coupon("BALD", DiscountType::Percent, dec!(10), |c| {
        c.valid_from = Set(Some(Utc::now() + Duration::days(7)));
    })
    .await;

    let response = validate(&app, "BALD", "100.00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Dieser Gutschein ist noch nicht aktiv"));
}

#[tokio::test]
async fn expired_coupon_is_rejected() {
    let app = TestApp::new().await;
    app.seed_coupon("VORBEI", DiscountType::Percent, dec!(10), |c| {
        c.valid_until = Set(Some(Utc::now() - Duration::days(1)));
    })
    .await;

    let response = validate(&app, "VORBEI", "100.00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Dieser Gutschein ist abgelaufen"));
}

#[tokio::test]
async fn exhausted_coupon_is_rejected() {
    let app = TestApp::new().await;
    app.seed_coupon("AUSGEBUCHT", DiscountType::Fixed, dec!(5), |c| {
        c.max_uses = Set(Some(3));
        c.uses_count = Set(3);
    })
    .await;

    let response = validate(&app, "AUSGEBUCHT", "100.00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Maximale Nutzungsanzahl erreicht"));
}

#[tokio::test]
async fn below_minimum_rejection_names_the_threshold() {
    let app = TestApp::new().await;
    app.seed_coupon("GROSS50", DiscountType::Fixed, dec!(5), |c| {
        c.min_order_value = Set(Some(dec!(50)));
    })
    .await;

    let response = validate(&app, "GROSS50", "49.99").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Mindestbestellwert: €50.00"));
}

#[tokio::test]
async fn fixed_discount_is_clamped_to_subtotal() {
    let app = TestApp::new().await;
    app.seed_coupon("ZWANZIG", DiscountType::Fixed, dec!(20), |_| {})
        .await;

    let response = validate(&app, "ZWANZIG", "12.50").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["discount_amount"], json!("12.50"));
}

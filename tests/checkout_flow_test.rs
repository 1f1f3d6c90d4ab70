//! Integration tests for the checkout pipeline: quote creation, pricing,
//! session re-display and the storefront support endpoints.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{body_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use storefront_api::entities::checkout_session;
use storefront_api::entities::coupon::DiscountType;
use uuid::Uuid;

fn checkout_body(product_id: Uuid, quantity: i32, country: &str, coupon: Option<&str>) -> Value {
    let mut body = json!({
        "customer_name": "Anna Gruber",
        "customer_email": "anna@example.com",
        "shipping_address": "Hauptstraße 1",
        "shipping_city": "Wien",
        "shipping_postal": "1010",
        "shipping_country": country,
        "items": [{"product_id": product_id, "quantity": quantity}]
    });
    if let Some(code) = coupon {
        body["coupon_code"] = json!(code);
    }
    body
}

fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("amount should serialize as string")
        .parse()
        .expect("amount should parse as decimal")
}

#[tokio::test]
async fn checkout_with_coupon_and_free_shipping() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(50.00), 10).await;
    app.seed_coupon("WILLKOMMEN10", DiscountType::Percent, dec!(10), |_| {})
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(
                product.id,
                2,
                "Österreich",
                Some("WILLKOMMEN10"),
            )),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    // €100 subtotal, 10% off, above the €60 free-shipping threshold
    assert_eq!(amount(&body["total_amount"]), dec!(90.00));
    assert_eq!(body["demo_mode"], json!(true));
    assert_eq!(body["session_token"].as_str().unwrap().len(), 64);
    assert!(body["checkout_url"]
        .as_str()
        .unwrap()
        .contains("/checkout/demo?token="));
}

#[tokio::test]
async fn checkout_below_threshold_pays_flat_rate() {
    let app = TestApp::new().await;
    let product = app.seed_product("Zirbenschnaps", dec!(20.00), 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 1, "Österreich", None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(amount(&body["total_amount"]), dec!(25.90));
}

#[tokio::test]
async fn checkout_to_unlisted_country_uses_fallback_rate() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(20.00), 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 1, "Spanien", None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(amount(&body["total_amount"]), dec!(29.90));
}

#[tokio::test]
async fn rejected_coupon_is_ignored_at_checkout() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(30.00), 5).await;
    // Coupon exists but requires a larger cart; checkout proceeds undiscounted
    app.seed_coupon("GROSS50", DiscountType::Fixed, dec!(5), |c| {
        c.min_order_value = Set(Some(dec!(100)));
    })
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 1, "Österreich", Some("GROSS50"))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(amount(&body["total_amount"]), dec!(35.90));

    let token = body["session_token"].as_str().unwrap();
    let session = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/session/{}", token),
            None,
        )
        .await;
    let session_body = body_json(session).await;
    assert_eq!(amount(&session_body["discount_amount"]), dec!(0));
    assert!(session_body.get("coupon_code").is_none());
}

#[tokio::test]
async fn checkout_rejects_insufficient_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(20.00), 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 2, "Österreich", None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Not enough stock for Marillenlikör"));
}

#[tokio::test]
async fn checkout_rejects_unknown_product() {
    let app = TestApp::new().await;
    let ghost_id = Uuid::new_v4();

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(ghost_id, 1, "Österreich", None)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains(&format!("Product {} not found", ghost_id)));
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let app = TestApp::new().await;
    let mut body = checkout_body(Uuid::new_v4(), 1, "Österreich", None);
    body["items"] = json!([]);

    let response = app
        .request(Method::POST, "/api/v1/orders/create-checkout", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_redisplay_serves_pending_sessions_only() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(25.00), 5).await;

    // Unknown token
    let response = app
        .request(Method::GET, "/api/v1/checkout/session/deadbeef", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Pending session displays the full quote snapshot
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 2, "Österreich", None)),
        )
        .await;
    let created_body = body_json(created).await;
    let token = created_body["session_token"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/session/{}", token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["customer_name"], json!("Anna Gruber"));
    assert_eq!(body["items"][0]["name"], json!("Marillenlikör"));
    assert_eq!(body["items"][0]["quantity"], json!(2));
    assert_eq!(amount(&body["subtotal"]), dec!(50.00));
    assert_eq!(body["is_demo"], json!(true));

    // Completed sessions answer not-found
    let completed = app
        .request(
            Method::POST,
            "/api/v1/checkout/demo/complete",
            Some(json!({"token": token, "card_number": "4242 4242 4242 4242"})),
        )
        .await;
    assert_eq!(completed.status(), StatusCode::OK);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/session/{}", token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_session_redisplay_answers_gone() {
    let app = TestApp::new().await;
    let product = app.seed_product("Marillenlikör", dec!(25.00), 5).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/orders/create-checkout",
            Some(checkout_body(product.id, 1, "Österreich", None)),
        )
        .await;
    let token = body_json(created).await["session_token"]
        .as_str()
        .unwrap()
        .to_string();

    let session = checkout_session::Entity::find()
        .filter(checkout_session::Column::SessionToken.eq(token.clone()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut update: checkout_session::ActiveModel = session.into();
    update.expires_at = Set(Utc::now() - Duration::hours(2));
    update.update(&*app.state.db).await.unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/session/{}", token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::GONE);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Checkout session expired"));
}

#[tokio::test]
async fn checkout_status_reports_demo_mode_with_test_cards() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/checkout/status", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["demo_mode"], json!(true));
    assert_eq!(body["provider_configured"], json!(false));
    let cards = body["test_cards"].as_array().unwrap();
    assert_eq!(cards.len(), 3);
    assert_eq!(cards[0]["number"], json!("4242 4242 4242 4242"));
}

#[tokio::test]
async fn shipping_rates_lists_seeded_countries() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/shipping-rates", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let rates = body.as_array().unwrap();
    assert!(rates.len() >= 7);

    let austria = rates
        .iter()
        .find(|r| r["country"] == json!("Österreich"))
        .expect("seeded Austrian rate");
    assert_eq!(amount(&austria["rate"]), dec!(5.90));
    assert_eq!(amount(&austria["free_shipping_threshold"]), dec!(60));
}

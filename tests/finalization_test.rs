//! Integration tests for demo-mode order finalization: effects on inventory
//! and coupons, identifier assignment, idempotent replays and tracking
//! lookup.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Duration, Utc};
use common::{body_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use storefront_api::entities::coupon::DiscountType;
use storefront_api::entities::{checkout_session, coupon, product};
use uuid::Uuid;

fn checkout_body(product_id: Uuid, quantity: i32, coupon_code: Option<&str>) -> Value {
    let mut body = json!({
        "customer_name": "Anna Gruber",
        "customer_email": "anna@example.com",
        "shipping_address": "Hauptstraße 1",
        "shipping_city": "Wien",
        "shipping_postal": "1010",
        "shipping_country": "Österreich",
        "items": [{"product_id": product_id, "quantity": quantity}]
    });
    if let Some(code) = coupon_code {
        body["coupon_code"] = json!(code);
    }
    body
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn create_session(app: &TestApp, body: Value) -> String {
    let response = app
        .request(Method::POST, "/api/v1/orders/create-checkout", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["session_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn complete_demo(app: &TestApp, token: &str, card: &str) -> axum::response::Response {
    app.request(
        Method::POST,
        "/api/v1/checkout/demo/complete",
        Some(json!({"token": token, "card_number": card})),
    )
    .await
}

#[tokio::test]
async fn demo_completion_finalizes_order_with_all_effects() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(50.00), 10).await;
    app.seed_coupon("WILLKOMMEN10", DiscountType::Percent, dec!(10), |_| {})
        .await;

    let token = create_session(
        &app,
        checkout_body(seeded.id, 2, Some("WILLKOMMEN10")),
    )
    .await;

    let response = complete_demo(&app, &token, "4242 4242 4242 4242").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["demo_mode"], json!(true));
    assert!(body.get("already_processed").is_none());

    // Order payload shape
    let order = &body["order"];
    let tracking = order["tracking_number"].as_str().unwrap();
    assert!(tracking.starts_with("HB"));
    assert_eq!(tracking.len(), 14);
    assert_eq!(
        order["invoice_number"],
        json!(format!("RE-{}-00001", Utc::now().year()))
    );
    assert_eq!(order["customer_email"], json!("anna@example.com"));
    assert_eq!(order["items"][0]["quantity"], json!(2));
    assert_eq!(amount(&order["subtotal"]), dec!(100.00));
    assert_eq!(amount(&order["discount_amount"]), dec!(10.00));
    assert_eq!(amount(&order["total_amount"]), dec!(90.00));
    // Paid orders are queued for fulfillment right away
    assert_eq!(order["status"], json!("processing"));
    assert_eq!(order["payment_status"], json!("paid"));

    // Inventory decremented, sales counted
    let updated = product::Entity::find_by_id(seeded.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 8);
    assert_eq!(updated.sold_count, 2);

    // Coupon usage counted
    let used = coupon::Entity::find()
        .filter(coupon::Column::Code.eq("WILLKOMMEN10"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(used.uses_count, 1);

    // Session closed
    let session = checkout_session::Entity::find()
        .filter(checkout_session::Column::SessionToken.eq(token))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.status,
        storefront_api::entities::checkout_session::SessionStatus::Completed
    );
    assert!(session.completed_at.is_some());
}

#[tokio::test]
async fn replayed_completion_returns_existing_order_without_side_effects() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 10).await;

    let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;

    let first = body_json(complete_demo(&app, &token, "4242424242424242").await).await;
    let second_response = complete_demo(&app, &token, "4242424242424242").await;
    assert_eq!(second_response.status(), StatusCode::OK);
    let second = body_json(second_response).await;

    assert_eq!(second["already_processed"], json!(true));
    assert_eq!(
        second["order"]["tracking_number"],
        first["order"]["tracking_number"]
    );

    // Stock was decremented exactly once
    let updated = product::Entity::find_by_id(seeded.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 9);
    assert_eq!(updated.sold_count, 1);
}

#[tokio::test]
async fn concurrent_completions_finalize_exactly_once() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 10).await;

    let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;

    let (a, b) = futures::join!(
        complete_demo(&app, &token, "4242424242424242"),
        complete_demo(&app, &token, "4242424242424242"),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let body_a = body_json(a).await;
    let body_b = body_json(b).await;
    assert_eq!(
        body_a["order"]["tracking_number"],
        body_b["order"]["tracking_number"]
    );

    let replays = [&body_a, &body_b]
        .iter()
        .filter(|body| body["already_processed"] == json!(true))
        .count();
    assert_eq!(replays, 1);

    let updated = product::Entity::find_by_id(seeded.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 9);
    assert_eq!(updated.sold_count, 1);
}

#[tokio::test]
async fn invalid_test_card_is_rejected() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 5).await;
    let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;

    let response = complete_demo(&app, &token, "4242 4242 4242 4241").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        json!("Invalid test card. Use 4242 4242 4242 4242 for testing.")
    );

    // Nothing was finalized
    let updated = product::Entity::find_by_id(seeded.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 5);
}

#[tokio::test]
async fn expired_session_cannot_be_finalized() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 5).await;
    let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;

    let session = checkout_session::Entity::find()
        .filter(checkout_session::Column::SessionToken.eq(token.clone()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut update: checkout_session::ActiveModel = session.into();
    update.expires_at = Set(Utc::now() - Duration::hours(2));
    update.update(&*app.state.db).await.unwrap();

    let response = complete_demo(&app, &token, "4242424242424242").await;
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn unknown_session_token_answers_not_found() {
    let app = TestApp::new().await;

    let response = complete_demo(&app, "no-such-token", "4242424242424242").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Checkout session not found"));
}

#[tokio::test]
async fn invoice_sequence_increments_per_order() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 10).await;
    let year = Utc::now().year();

    for expected_seq in 1..=3 {
        let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;
        let body = body_json(complete_demo(&app, &token, "4242424242424242").await).await;
        assert_eq!(
            body["order"]["invoice_number"],
            json!(format!("RE-{}-{:05}", year, expected_seq))
        );
    }
}

#[tokio::test]
async fn oversold_quote_floors_stock_at_zero() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 5).await;
    let token = create_session(&app, checkout_body(seeded.id, 3, None)).await;

    // Stock shrinks between quote and payment
    let mut update: product::ActiveModel = seeded.clone().into();
    update.stock = Set(2);
    update.update(&*app.state.db).await.unwrap();

    let response = complete_demo(&app, &token, "4242424242424242").await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = product::Entity::find_by_id(seeded.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.stock, 0);
    assert_eq!(updated.sold_count, 3);
}

#[tokio::test]
async fn tracking_lookup_is_case_insensitive() {
    let app = TestApp::new().await;
    let seeded = app.seed_product("Marillenlikör", dec!(25.00), 5).await;
    let token = create_session(&app, checkout_body(seeded.id, 1, None)).await;
    let body = body_json(complete_demo(&app, &token, "4242424242424242").await).await;
    let tracking = body["order"]["tracking_number"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/tracking/{}", tracking.to_lowercase()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let found = body_json(response).await;
    assert_eq!(found["tracking_number"], json!(tracking));
    assert_eq!(found["status"], json!("processing"));
    assert!(found["created_at"].is_string());

    // The public payload carries status only, no customer or payment data
    assert!(found.get("customer_name").is_none());
    assert!(found.get("customer_email").is_none());
    assert!(found.get("shipping_address").is_none());
    assert!(found.get("items").is_none());
    assert!(found.get("total_amount").is_none());

    let missing = app
        .request(Method::GET, "/api/v1/tracking/HB000000FFFFFF", None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

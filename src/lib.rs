//! Storefront API Library
//!
//! Checkout-to-fulfillment backend for an online shop: priced checkout
//! sessions, coupon and shipping evaluation, idempotent order finalization
//! and public order tracking.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Checkout-relevant HTTP surface, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Checkout pipeline
        .route(
            "/orders/create-checkout",
            post(handlers::checkout::create_checkout),
        )
        .route(
            "/checkout/session/:token",
            get(handlers::checkout::get_checkout_session),
        )
        .route(
            "/checkout/demo/complete",
            post(handlers::checkout::complete_demo_checkout),
        )
        .route("/checkout/status", get(handlers::checkout::checkout_status))
        // Payment verification (and its legacy alias)
        .route("/payment/verify", get(handlers::payments::verify_payment))
        .route(
            "/orders/verify-payment",
            get(handlers::payments::verify_payment),
        )
        // Storefront support endpoints
        .route("/coupons/validate", post(handlers::coupons::validate_coupon))
        .route(
            "/shipping-rates",
            get(handlers::shipping::list_shipping_rates),
        )
        .route(
            "/tracking/:tracking_number",
            get(handlers::orders::track_order),
        )
}

async fn api_status() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    Json(json!({
        "status": "ok",
        "version": version,
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

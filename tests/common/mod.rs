use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{coupon, product, shipping_rate},
    events::{self, EventSender},
    handlers::AppServices,
    notifications::{LogChannel, NotificationService},
    services::payments::{DemoGateway, PaymentProvider},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by a SQLite
/// database in a temporary directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application running the demo payment gateway.
    pub async fn new() -> Self {
        Self::with_provider(Arc::new(DemoGateway::new())).await
    }

    /// Construct a test application around a specific payment provider.
    pub async fn with_provider(provider: Arc<dyn PaymentProvider>) -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let notifier = Arc::new(NotificationService::new(
            Arc::new(LogChannel),
            Some("owner@example.com".to_string()),
        ));
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            db_arc.clone(),
            notifier,
        ));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            provider,
            cfg.shop_base_url.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            slug: Set(format!(
                "{}-{}",
                name.to_lowercase().replace(' ', "-"),
                &id.simple().to_string()[..8]
            )),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            sold_count: Set(0),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    /// Seeds an unrestricted active coupon; tweak the returned ActiveModel
    /// fields through `customize` for windowed or capped variants.
    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: coupon::DiscountType,
        discount_value: Decimal,
        customize: impl FnOnce(&mut coupon::ActiveModel),
    ) -> coupon::Model {
        let mut row = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            discount_type: Set(discount_type),
            discount_value: Set(discount_value),
            min_order_value: Set(None),
            max_uses: Set(None),
            uses_count: Set(0),
            valid_from: Set(None),
            valid_until: Set(None),
            is_active: Set(true),
            description: Set(None),
            created_at: Set(Utc::now()),
        };
        customize(&mut row);
        row.insert(&*self.state.db)
            .await
            .expect("seed coupon for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_shipping_rate(
        &self,
        country: &str,
        rate: Decimal,
        free_shipping_threshold: Decimal,
    ) -> shipping_rate::Model {
        shipping_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            country: Set(country.to_string()),
            rate: Set(rate),
            free_shipping_threshold: Set(free_shipping_threshold),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed shipping rate for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Collects a response body into parsed JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

pub mod checkout;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod shipping;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::checkout::CheckoutService;
use crate::services::coupons::CouponService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentProvider;
use crate::services::shipping::ShippingService;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub coupons: Arc<CouponService>,
    pub shipping: Arc<ShippingService>,
    pub orders: Arc<OrderService>,
    pub payment_provider: Arc<dyn PaymentProvider>,
}

impl AppServices {
    /// Wires the service graph around one database pool, one event channel
    /// and the payment provider selected at startup.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        payment_provider: Arc<dyn PaymentProvider>,
        shop_base_url: String,
    ) -> Self {
        let shipping = Arc::new(ShippingService::new(db_pool.clone()));
        let coupons = Arc::new(CouponService::new(db_pool.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db_pool.clone(),
            event_sender.clone(),
            shipping.clone(),
            coupons.clone(),
            payment_provider.clone(),
            shop_base_url,
        ));
        let orders = Arc::new(OrderService::new(
            db_pool,
            event_sender,
            payment_provider.clone(),
        ));

        Self {
            checkout,
            coupons,
            shipping,
            orders,
            payment_provider,
        }
    }
}

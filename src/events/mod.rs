use crate::db::DbPool;
use crate::entities::order;
use crate::notifications::NotificationService;
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Events emitted by the checkout pipeline. All of them are published after
// the emitting transaction has committed; consumers must never be able to
// roll an order back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutSessionCreated {
        session_id: Uuid,
        total_amount: Decimal,
        is_demo: bool,
    },
    OrderFinalized {
        order_id: Uuid,
    },
    CouponRedeemed {
        code: String,
        discount_amount: Decimal,
        tracking_number: String,
    },
    StockLow {
        product_id: Uuid,
        name: String,
        remaining: i32,
    },
    StockDepleted {
        product_id: Uuid,
        name: String,
    },
}

/// Consumes domain events and turns them into notifications. Delivery
/// failures are logged and swallowed here; they never reach the caller that
/// emitted the event.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    db: Arc<DbPool>,
    notifier: Arc<NotificationService>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::OrderFinalized { order_id } => {
                if let Err(e) = handle_order_finalized(&db, &notifier, order_id).await {
                    error!(
                        "Failed to handle order finalized event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::CouponRedeemed {
                code,
                discount_amount,
                tracking_number,
            } => {
                if let Err(e) = notifier
                    .coupon_used(&code, discount_amount, &tracking_number)
                    .await
                {
                    error!(
                        "Failed to handle coupon redeemed event: code={}, error={}",
                        code, e
                    );
                }
            }
            Event::StockLow {
                product_id,
                name,
                remaining,
            } => {
                if let Err(e) = notifier.low_stock(&name, remaining).await {
                    error!(
                        "Failed to handle low stock event: product_id={}, error={}",
                        product_id, e
                    );
                }
            }
            Event::StockDepleted { product_id, name } => {
                if let Err(e) = notifier.out_of_stock(&name).await {
                    error!(
                        "Failed to handle stock depleted event: product_id={}, error={}",
                        product_id, e
                    );
                }
            }
            Event::CheckoutSessionCreated {
                session_id,
                total_amount,
                is_demo,
            } => {
                info!(
                    %session_id, %total_amount, is_demo,
                    "Checkout session created"
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_order_finalized(
    db: &DbPool,
    notifier: &NotificationService,
    order_id: Uuid,
) -> Result<(), String> {
    let order = order::Entity::find_by_id(order_id)
        .one(db)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("order {} not found", order_id))?;

    notifier.order_confirmation(&order).await?;
    notifier.admin_new_order(&order).await?;

    Ok(())
}

use crate::entities::order;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Fallback recipient label when no owner address is configured
const DEFAULT_ADMIN_RECIPIENT: &str = "shop-owner";

/// Stock level below which the owner gets a reorder alert
pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderConfirmation,
    NewOrderAlert,
    LowStockAlert,
    OutOfStockAlert,
    CouponUsedAlert,
}

/// A composed, ready-to-deliver message
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Delivery boundary. Real deployments plug SMTP or Telegram in here; the
/// default just writes to the log.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), String>;
}

/// Tracing-backed channel used when no delivery backend is wired up
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), String> {
        info!(
            kind = ?notification.kind,
            recipient = %notification.recipient,
            subject = %notification.subject,
            "Delivering notification"
        );
        Ok(())
    }
}

/// Composes customer and owner messages and hands them to the channel.
/// One retry per message; failures bubble up as strings for the event loop
/// to log.
pub struct NotificationService {
    channel: Arc<dyn NotificationChannel>,
    admin_recipient: String,
}

impl NotificationService {
    pub fn new(channel: Arc<dyn NotificationChannel>, admin_recipient: Option<String>) -> Self {
        Self {
            channel,
            admin_recipient: admin_recipient
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_RECIPIENT.to_string()),
        }
    }

    async fn dispatch(&self, notification: Notification) -> Result<(), String> {
        match self.channel.deliver(&notification).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(
                    subject = %notification.subject,
                    error = %first,
                    "Notification delivery failed, retrying once"
                );
                self.channel
                    .deliver(&notification)
                    .await
                    .map_err(|second| format!("{} (retry: {})", first, second))
            }
        }
    }

    /// Order confirmation to the customer
    pub async fn order_confirmation(&self, order: &order::Model) -> Result<(), String> {
        let items = order.line_items().map_err(|e| e.to_string())?;
        let product_lines: String = items
            .iter()
            .map(|item| format!("  - {} x{}\n", item.name, item.quantity))
            .collect();

        let mut body = format!(
            "Vielen Dank für Ihre Bestellung, {}!\n\n\
             Bestellnummer: {}\n\
             Rechnungsnummer: {}\n\n\
             Produkte:\n{}\n\
             Zwischensumme: €{:.2}\n\
             Versand: €{:.2}\n",
            order.customer_name,
            order.tracking_number,
            order.invoice_number,
            product_lines,
            order.subtotal,
            order.shipping_cost,
        );
        if order.discount_amount > Decimal::ZERO {
            body.push_str(&format!("Rabatt: -€{:.2}\n", order.discount_amount));
        }
        body.push_str(&format!(
            "Gesamt: €{:.2}\n\nLieferadresse:\n{}, {} {}\n{}\n",
            order.total_amount,
            order.shipping_address,
            order.shipping_postal,
            order.shipping_city,
            order.shipping_country,
        ));

        self.dispatch(Notification {
            kind: NotificationKind::OrderConfirmation,
            recipient: order.customer_email.clone(),
            subject: format!("Bestellbestätigung #{}", order.tracking_number),
            body,
        })
        .await
    }

    /// New-order alert to the shop owner
    pub async fn admin_new_order(&self, order: &order::Model) -> Result<(), String> {
        let items = order.line_items().map_err(|e| e.to_string())?;
        let product_lines: String = items
            .iter()
            .map(|item| format!("  - {} x{}\n", item.name, item.quantity))
            .collect();

        let body = format!(
            "Neue Bestellung\n\n\
             Bestellnr: {}\n\
             Kunde: {}\n\
             E-Mail: {}\n\n\
             Produkte:\n{}\n\
             Summe: €{:.2}\n\n\
             Versand an:\n{}, {} {}\n{}\n",
            order.tracking_number,
            order.customer_name,
            order.customer_email,
            product_lines,
            order.total_amount,
            order.shipping_address,
            order.shipping_postal,
            order.shipping_city,
            order.shipping_country,
        );

        self.dispatch(Notification {
            kind: NotificationKind::NewOrderAlert,
            recipient: self.admin_recipient.clone(),
            subject: "Neue Bestellung eingegangen".to_string(),
            body,
        })
        .await
    }

    /// Reorder alert when a product runs low
    pub async fn low_stock(&self, product_name: &str, remaining: i32) -> Result<(), String> {
        self.dispatch(Notification {
            kind: NotificationKind::LowStockAlert,
            recipient: self.admin_recipient.clone(),
            subject: "Niedriger Lagerbestand".to_string(),
            body: format!(
                "{}: nur noch {} Stück auf Lager. Bitte nachbestellen!",
                product_name, remaining
            ),
        })
        .await
    }

    /// Alert when a product hits zero stock
    pub async fn out_of_stock(&self, product_name: &str) -> Result<(), String> {
        self.dispatch(Notification {
            kind: NotificationKind::OutOfStockAlert,
            recipient: self.admin_recipient.clone(),
            subject: "Produkt ausverkauft".to_string(),
            body: format!(
                "{} ist komplett ausverkauft (0 Stück). Dringend nachbestellen!",
                product_name
            ),
        })
        .await
    }

    /// Owner alert that a coupon was redeemed
    pub async fn coupon_used(
        &self,
        code: &str,
        discount_amount: Decimal,
        tracking_number: &str,
    ) -> Result<(), String> {
        self.dispatch(Notification {
            kind: NotificationKind::CouponUsedAlert,
            recipient: self.admin_recipient.clone(),
            subject: "Gutschein eingelöst".to_string(),
            body: format!(
                "Gutschein {} eingelöst: -€{:.2} (Bestellung {})",
                code, discount_amount, tracking_number
            ),
        })
        .await
    }
}

use crate::db::DbPool;
use crate::entities::checkout_session::{self, CouponSnapshot, LineItem, SessionStatus};
use crate::entities::product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::coupons::CouponService;
use crate::services::payments::PaymentProvider;
use crate::services::shipping::ShippingService;
use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How long a price quote stays payable.
const SESSION_TTL_HOURS: i64 = 1;

/// Opaque unguessable token used as the session lookup key.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// One cart line as submitted by the storefront
#[derive(Debug, Clone)]
pub struct CartItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Everything needed to price a cart and open a session
#[derive(Debug, Clone)]
pub struct CreateCheckoutInput {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub shipping_country: String,
    pub items: Vec<CartItemInput>,
    pub coupon_code: Option<String>,
    /// Origin for post-payment redirects; falls back to the configured shop
    /// base URL
    pub origin_url: Option<String>,
}

/// What the storefront needs to send the customer onward
#[derive(Debug, Clone)]
pub struct CheckoutCreated {
    pub session_token: String,
    pub checkout_url: String,
    pub total_amount: Decimal,
    pub demo_mode: bool,
}

/// Turns a cart into a persisted, time-boxed price quote. Creating a session
/// has no side effects on inventory or coupons; it is a quote, not a
/// commitment.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    shipping: Arc<ShippingService>,
    coupons: Arc<CouponService>,
    provider: Arc<dyn PaymentProvider>,
    shop_base_url: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        shipping: Arc<ShippingService>,
        coupons: Arc<CouponService>,
        provider: Arc<dyn PaymentProvider>,
        shop_base_url: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            shipping,
            coupons,
            provider,
            shop_base_url,
        }
    }

    /// Prices the cart against the live catalog, snapshots every line item,
    /// persists the pending session and asks the payment provider for a
    /// redirect target.
    #[instrument(skip(self, input), fields(customer_email = %input.customer_email))]
    pub async fn create_checkout(
        &self,
        input: CreateCheckoutInput,
    ) -> Result<CheckoutCreated, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        // Step 1: resolve products, check stock, freeze the line-item snapshot
        let mut subtotal = Decimal::ZERO;
        let mut line_items = Vec::with_capacity(input.items.len());

        for item in &input.items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Invalid quantity for product {}",
                    item.product_id
                )));
            }

            let found = product::Entity::find_by_id(item.product_id)
                .one(&*self.db)
                .await?;
            let product = match found {
                Some(p) if p.is_active => p,
                _ => {
                    return Err(ServiceError::ValidationError(format!(
                        "Product {} not found",
                        item.product_id
                    )))
                }
            };

            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for {}",
                    product.name
                )));
            }

            let line_total = product.price * Decimal::from(item.quantity);
            subtotal += line_total;
            line_items.push(LineItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                line_total,
            });
        }

        // Step 2: shipping from the declared country and the computed subtotal
        let shipping_cost = self
            .shipping
            .quote(&input.shipping_country, subtotal)
            .await?;

        // Step 3: lenient coupon evaluation; a rejected code means no
        // discount, never a failed checkout
        let mut discount_amount = Decimal::ZERO;
        let mut coupon_snapshot: Option<CouponSnapshot> = None;
        if let Some(code) = input.coupon_code.as_deref() {
            if let Some(evaluation) = self.coupons.apply(code, subtotal).await? {
                discount_amount = evaluation.discount_amount;
                coupon_snapshot = Some(CouponSnapshot {
                    code: evaluation.code,
                    discount_type: evaluation.discount_type,
                    discount_value: evaluation.discount_value,
                    description: evaluation.description,
                });
            }
        }

        let total_amount = subtotal - discount_amount + shipping_cost;

        // Step 4: persist the quote
        let now = Utc::now();
        let session_token = generate_session_token();
        let session = checkout_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_token: Set(session_token.clone()),
            customer_name: Set(input.customer_name),
            customer_email: Set(input.customer_email),
            customer_phone: Set(input.customer_phone),
            shipping_address: Set(input.shipping_address),
            shipping_city: Set(input.shipping_city),
            shipping_postal: Set(input.shipping_postal),
            shipping_country: Set(input.shipping_country),
            items: Set(serde_json::to_value(&line_items)?),
            subtotal: Set(subtotal),
            shipping_cost: Set(shipping_cost),
            discount_amount: Set(discount_amount),
            total_amount: Set(total_amount),
            coupon_code: Set(coupon_snapshot.as_ref().map(|c| c.code.clone())),
            coupon_details: Set(match &coupon_snapshot {
                Some(snapshot) => Some(serde_json::to_value(snapshot)?),
                None => None,
            }),
            status: Set(SessionStatus::Pending),
            is_demo: Set(self.provider.is_demo()),
            payment_session_id: Set(None),
            expires_at: Set(now + Duration::hours(SESSION_TTL_HOURS)),
            created_at: Set(now),
            completed_at: Set(None),
        };
        let session = session.insert(&*self.db).await?;

        // Step 5: hand off to the payment provider for the redirect target
        let origin = input
            .origin_url
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .unwrap_or(&self.shop_base_url);
        let provider_checkout = self.provider.create_session(&session, origin).await?;

        if let Some(payment_session_id) = &provider_checkout.payment_session_id {
            let mut update: checkout_session::ActiveModel = session.clone().into();
            update.payment_session_id = Set(Some(payment_session_id.clone()));
            update.update(&*self.db).await?;
        }

        info!(
            session_token = %session_token,
            %total_amount,
            demo_mode = self.provider.is_demo(),
            "Checkout session created"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::CheckoutSessionCreated {
                session_id: session.id,
                total_amount,
                is_demo: self.provider.is_demo(),
            })
            .await
        {
            warn!(error = %e, "Failed to send checkout session created event");
        }

        Ok(CheckoutCreated {
            session_token,
            checkout_url: provider_checkout.checkout_url,
            total_amount,
            demo_mode: self.provider.is_demo(),
        })
    }

    /// Loads a pending session for re-display. Completed or unknown tokens
    /// answer not-found; expired pending sessions answer gone.
    #[instrument(skip(self))]
    pub async fn get_pending_session(
        &self,
        token: &str,
    ) -> Result<checkout_session::Model, ServiceError> {
        let session = checkout_session::Entity::find()
            .filter(checkout_session::Column::SessionToken.eq(token))
            .filter(checkout_session::Column::Status.eq(SessionStatus::Pending))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::SessionNotFound("Checkout session not found".to_string())
            })?;

        if session.is_expired_at(Utc::now()) {
            return Err(ServiceError::SessionExpired);
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_long_and_unique() {
        let first = generate_session_token();
        let second = generate_session_token();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}

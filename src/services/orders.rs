use crate::db::DbPool;
use crate::entities::checkout_session::{self, SessionStatus};
use crate::entities::order::{self, OrderStatus, PaymentStatus};
use crate::entities::{coupon, invoice_counter, payment_transaction, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::notifications::LOW_STOCK_THRESHOLD;
use crate::services::payments::{is_valid_test_card, normalize_card_number, PaymentProvider};
use chrono::{Datelike, Utc};
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Tracking numbers look like `HB260829A1B2C3`: a fixed prefix, the date and
/// three random bytes.
pub fn generate_tracking_number() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill(&mut bytes[..]);
    format!(
        "HB{}{}",
        Utc::now().format("%y%m%d"),
        hex::encode(bytes).to_uppercase()
    )
}

/// Invoice numbers are sequential per calendar year, e.g. `RE-2026-00042`.
pub fn format_invoice_number(year: i32, sequence: i64) -> String {
    format!("RE-{}-{:05}", year, sequence)
}

/// Result of finalizing a checkout session. `already_processed` is true when
/// the order existed before this call, i.e. the caller replayed a
/// confirmation.
#[derive(Debug, Clone)]
pub struct FinalizationOutcome {
    pub order: order::Model,
    pub already_processed: bool,
}

/// What a payment verification call found at the provider.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Finalized(FinalizationOutcome),
    /// The provider session exists but the customer has not paid yet
    NotCompleted { status: String },
}

/// Turns a paid checkout session into a durable order exactly once.
///
/// All effects of finalization (order row, stock decrement, coupon usage,
/// payment ledger row, session completion, invoice sequence) happen in one
/// transaction; the unique index on `orders.checkout_session_token` is the
/// arbiter when two confirmations race.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    provider: Arc<dyn PaymentProvider>,
}

fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unique") || msg.contains("duplicate")
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            db,
            event_sender,
            provider,
        }
    }

    /// Completes a demo payment: validates the test card, then finalizes the
    /// session as if the provider had confirmed it.
    #[instrument(skip(self, card_number))]
    pub async fn complete_demo(
        &self,
        session_token: &str,
        card_number: &str,
    ) -> Result<FinalizationOutcome, ServiceError> {
        if !is_valid_test_card(card_number) {
            return Err(ServiceError::InvalidTestCard);
        }

        let session = checkout_session::Entity::find()
            .filter(checkout_session::Column::SessionToken.eq(session_token))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::SessionNotFound("Checkout session not found".to_string())
            })?;

        // Sessions opened against a hosted provider can only be settled by
        // that provider; a test card must never mark them paid.
        if !session.is_demo {
            return Err(ServiceError::SessionNotFound(
                "Checkout session not found".to_string(),
            ));
        }

        let normalized = normalize_card_number(card_number);
        let last4 = &normalized[normalized.len().saturating_sub(4)..];
        let metadata = json!({ "demo": true, "card_last4": last4 });

        self.finalize_session(session, format!("demo_{}", session_token), metadata)
            .await
    }

    /// Confirms a provider-side payment session and finalizes the checkout it
    /// belongs to. Safe to call any number of times; replays answer with the
    /// existing order.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        payment_session_id: &str,
    ) -> Result<VerifyOutcome, ServiceError> {
        // Replay guard: an order for this provider session means a previous
        // verification already finalized it. No provider round-trip needed.
        if let Some(existing) = order::Entity::find()
            .filter(order::Column::PaymentSessionId.eq(payment_session_id))
            .one(&*self.db)
            .await?
        {
            return Ok(VerifyOutcome::Finalized(FinalizationOutcome {
                order: existing,
                already_processed: true,
            }));
        }

        let verification = self.provider.verify_session(payment_session_id).await?;
        if !verification.paid {
            return Ok(VerifyOutcome::NotCompleted {
                status: verification.status,
            });
        }

        // Prefer the checkout token the provider carried through metadata;
        // fall back to the session that recorded this provider id.
        let session = match &verification.checkout_token {
            Some(token) => {
                checkout_session::Entity::find()
                    .filter(checkout_session::Column::SessionToken.eq(token))
                    .one(&*self.db)
                    .await?
            }
            None => {
                checkout_session::Entity::find()
                    .filter(checkout_session::Column::PaymentSessionId.eq(payment_session_id))
                    .one(&*self.db)
                    .await?
            }
        }
        .ok_or_else(|| ServiceError::SessionNotFound("Checkout session not found".to_string()))?;

        let metadata = json!({ "provider_status": verification.status });
        let outcome = self
            .finalize_session(session, payment_session_id.to_string(), metadata)
            .await?;

        Ok(VerifyOutcome::Finalized(outcome))
    }

    /// Order lookup by tracking number, case-insensitive on input.
    #[instrument(skip(self))]
    pub async fn find_by_tracking(&self, tracking_number: &str) -> Result<order::Model, ServiceError> {
        order::Entity::find()
            .filter(order::Column::TrackingNumber.eq(tracking_number.trim().to_uppercase()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    async fn find_by_session_token(
        &self,
        session_token: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CheckoutSessionToken.eq(session_token))
            .one(&*self.db)
            .await?)
    }

    /// The single write path that creates orders.
    async fn finalize_session(
        &self,
        session: checkout_session::Model,
        payment_session_id: String,
        payment_metadata: serde_json::Value,
    ) -> Result<FinalizationOutcome, ServiceError> {
        // A completed session with an order behind it is a replay, not an
        // error. A completed session without one should not happen.
        if session.status == SessionStatus::Completed {
            return match self.find_by_session_token(&session.session_token).await? {
                Some(existing) => Ok(FinalizationOutcome {
                    order: existing,
                    already_processed: true,
                }),
                None => Err(ServiceError::SessionAlreadyCompleted(
                    "Checkout session already completed".to_string(),
                )),
            };
        }

        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(ServiceError::SessionExpired);
        }

        let items = session.line_items()?;

        let txn = self.db.begin().await?;

        let year = now.year();
        let sequence = next_invoice_sequence(&txn, year).await?;
        let invoice_number = format_invoice_number(year, sequence);
        let tracking_number = generate_tracking_number();

        let order_row = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            tracking_number: Set(tracking_number.clone()),
            invoice_number: Set(invoice_number),
            checkout_session_token: Set(session.session_token.clone()),
            customer_name: Set(session.customer_name.clone()),
            customer_email: Set(session.customer_email.clone()),
            customer_phone: Set(session.customer_phone.clone()),
            shipping_address: Set(session.shipping_address.clone()),
            shipping_city: Set(session.shipping_city.clone()),
            shipping_postal: Set(session.shipping_postal.clone()),
            shipping_country: Set(session.shipping_country.clone()),
            items: Set(session.items.clone()),
            subtotal: Set(session.subtotal),
            shipping_cost: Set(session.shipping_cost),
            discount_amount: Set(session.discount_amount),
            total_amount: Set(session.total_amount),
            coupon_code: Set(session.coupon_code.clone()),
            // Paid orders are immediately queued for fulfillment
            status: Set(OrderStatus::Processing),
            payment_status: Set(PaymentStatus::Paid),
            payment_session_id: Set(Some(payment_session_id.clone())),
            created_at: Set(now),
        };

        let order = match order_row.insert(&txn).await {
            Ok(order) => order,
            Err(err) if is_unique_violation(&err) => {
                // A concurrent finalization won the insert. Drop our work and
                // answer with the winner's order.
                txn.rollback().await?;
                return match self.find_by_session_token(&session.session_token).await? {
                    Some(existing) => Ok(FinalizationOutcome {
                        order: existing,
                        already_processed: true,
                    }),
                    None => Err(ServiceError::DatabaseError(err)),
                };
            }
            Err(err) => return Err(err.into()),
        };

        // Inventory: conditional decrement, floored at zero when the quote
        // oversold between creation and payment.
        let mut stock_events = Vec::new();
        for item in &items {
            let updated = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(item.quantity),
                )
                .col_expr(
                    product::Column::SoldCount,
                    Expr::col(product::Column::SoldCount).add(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;

            if updated.rows_affected == 0 {
                product::Entity::update_many()
                    .col_expr(product::Column::Stock, Expr::value(0))
                    .col_expr(
                        product::Column::SoldCount,
                        Expr::col(product::Column::SoldCount).add(item.quantity),
                    )
                    .filter(product::Column::Id.eq(item.product_id))
                    .exec(&txn)
                    .await?;
            }

            if let Some(product) = product::Entity::find_by_id(item.product_id).one(&txn).await? {
                if product.stock == 0 {
                    stock_events.push(Event::StockDepleted {
                        product_id: product.id,
                        name: product.name,
                    });
                } else if product.stock <= LOW_STOCK_THRESHOLD {
                    stock_events.push(Event::StockLow {
                        product_id: product.id,
                        name: product.name,
                        remaining: product.stock,
                    });
                }
            }
        }

        if let Some(code) = &session.coupon_code {
            coupon::Entity::update_many()
                .col_expr(
                    coupon::Column::UsesCount,
                    Expr::col(coupon::Column::UsesCount).add(1),
                )
                .filter(coupon::Column::Code.eq(code.clone()))
                .exec(&txn)
                .await?;
        }

        let ledger_row = payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            payment_session_id: Set(payment_session_id.clone()),
            amount: Set(session.total_amount),
            currency: Set("eur".to_string()),
            payment_status: Set(PaymentStatus::Paid),
            metadata: Set(payment_metadata),
            created_at: Set(now),
        };
        ledger_row.insert(&txn).await?;

        let mut session_update: checkout_session::ActiveModel = session.clone().into();
        session_update.status = Set(SessionStatus::Completed);
        session_update.completed_at = Set(Some(now));
        session_update.payment_session_id = Set(Some(payment_session_id));
        session_update.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order.id,
            tracking_number = %order.tracking_number,
            invoice_number = %order.invoice_number,
            total_amount = %order.total_amount,
            "Order finalized"
        );

        self.emit(Event::OrderFinalized { order_id: order.id }).await;
        if let Some(code) = &order.coupon_code {
            self.emit(Event::CouponRedeemed {
                code: code.clone(),
                discount_amount: order.discount_amount,
                tracking_number: order.tracking_number.clone(),
            })
            .await;
        }
        for event in stock_events {
            self.emit(event).await;
        }

        Ok(FinalizationOutcome {
            order,
            already_processed: false,
        })
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "Failed to publish event");
        }
    }
}

/// Advances the per-year invoice counter. Concurrent callers in the same year
/// serialize on the counter row's UPDATE; the first order of a year creates
/// the row.
async fn next_invoice_sequence(
    txn: &DatabaseTransaction,
    year: i32,
) -> Result<i64, ServiceError> {
    let updated = invoice_counter::Entity::update_many()
        .col_expr(
            invoice_counter::Column::LastValue,
            Expr::col(invoice_counter::Column::LastValue).add(1),
        )
        .filter(invoice_counter::Column::Year.eq(year))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        let first = invoice_counter::ActiveModel {
            year: Set(year),
            last_value: Set(1),
        };
        match first.insert(txn).await {
            Ok(_) => return Ok(1),
            // Lost the race to create the year row; fall through to the
            // increment path.
            Err(err) if is_unique_violation(&err) => {
                invoice_counter::Entity::update_many()
                    .col_expr(
                        invoice_counter::Column::LastValue,
                        Expr::col(invoice_counter::Column::LastValue).add(1),
                    )
                    .filter(invoice_counter::Column::Year.eq(year))
                    .exec(txn)
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let row = invoice_counter::Entity::find_by_id(year)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("invoice counter row for {} vanished", year))
        })?;

    Ok(row.last_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_number_has_prefix_date_and_random_suffix() {
        let tracking = generate_tracking_number();

        assert_eq!(tracking.len(), 14);
        assert!(tracking.starts_with("HB"));

        let date_part = &tracking[2..8];
        assert_eq!(date_part, Utc::now().format("%y%m%d").to_string());

        let suffix = &tracking[8..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn tracking_numbers_vary() {
        assert_ne!(generate_tracking_number()[8..], generate_tracking_number()[8..]);
    }

    #[test]
    fn invoice_number_pads_to_five_digits() {
        assert_eq!(format_invoice_number(2026, 1), "RE-2026-00001");
        assert_eq!(format_invoice_number(2026, 42), "RE-2026-00042");
        assert_eq!(format_invoice_number(2027, 123456), "RE-2027-123456");
    }

    #[test]
    fn unique_violation_detection_matches_both_backends() {
        let sqlite = DbErr::Custom("UNIQUE constraint failed: orders.tracking_number".into());
        let postgres =
            DbErr::Custom("duplicate key value violates unique constraint \"orders_pkey\"".into());
        let other = DbErr::Custom("connection reset".into());

        assert!(is_unique_violation(&sqlite));
        assert!(is_unique_violation(&postgres));
        assert!(!is_unique_violation(&other));
    }
}

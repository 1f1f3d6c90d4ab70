use crate::db::DbPool;
use crate::entities::coupon::{self, DiscountType};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;

/// Why a coupon does not apply. Messages are the customer-facing German
/// strings the storefront displays verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    /// Unknown or inactive code
    Invalid,
    NotYetActive,
    Expired,
    Exhausted,
    BelowMinimum(Decimal),
}

impl CouponRejection {
    pub fn message(&self) -> String {
        match self {
            Self::Invalid => "Ungültiger Gutscheincode".to_string(),
            Self::NotYetActive => "Dieser Gutschein ist noch nicht aktiv".to_string(),
            Self::Expired => "Dieser Gutschein ist abgelaufen".to_string(),
            Self::Exhausted => "Maximale Nutzungsanzahl erreicht".to_string(),
            Self::BelowMinimum(min) => format!("Mindestbestellwert: €{:.2}", min),
        }
    }
}

/// Discount amount for a coupon type and value against a subtotal.
///
/// Percent discounts are rounded to cents; fixed discounts are clamped to the
/// subtotal so a coupon can never push a total negative.
pub fn discount_for(discount_type: DiscountType, value: Decimal, subtotal: Decimal) -> Decimal {
    match discount_type {
        DiscountType::Percent => (subtotal * value / dec!(100)).round_dp(2),
        DiscountType::Fixed => value.min(subtotal),
    }
}

/// Pure evaluation of a coupon row against a subtotal at a given instant.
/// Rejections are checked in a fixed order; the first one wins.
pub fn evaluate(
    coupon: &coupon::Model,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Invalid);
    }
    if let Some(valid_from) = coupon.valid_from {
        if now < valid_from {
            return Err(CouponRejection::NotYetActive);
        }
    }
    if let Some(valid_until) = coupon.valid_until {
        if now > valid_until {
            return Err(CouponRejection::Expired);
        }
    }
    if let Some(max_uses) = coupon.max_uses {
        if coupon.uses_count >= max_uses {
            return Err(CouponRejection::Exhausted);
        }
    }
    if let Some(min_order_value) = coupon.min_order_value {
        if subtotal < min_order_value {
            return Err(CouponRejection::BelowMinimum(min_order_value));
        }
    }

    Ok(discount_for(
        coupon.discount_type,
        coupon.discount_value,
        subtotal,
    ))
}

/// A successfully priced coupon, ready to be snapshotted onto a session.
#[derive(Debug, Clone)]
pub struct CouponEvaluation {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub description: Option<String>,
}

/// Coupon lookup and evaluation. The same core backs the strict pre-flight
/// validation endpoint and the lenient apply-at-checkout path.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DbPool>,
}

impl CouponService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Case-insensitive lookup of an active coupon.
    async fn find_active(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        let normalized = code.trim().to_uppercase();
        Ok(coupon::Entity::find()
            .filter(coupon::Column::Code.eq(normalized))
            .filter(coupon::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?)
    }

    /// Strict evaluation for the pre-flight validation endpoint. Rejects hard
    /// with the customer-facing reason.
    #[instrument(skip(self))]
    pub async fn validate_strict(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<CouponEvaluation, ServiceError> {
        let coupon = self
            .find_active(code)
            .await?
            .ok_or_else(|| ServiceError::CouponInvalid(CouponRejection::Invalid.message()))?;

        match evaluate(&coupon, subtotal, Utc::now()) {
            Ok(discount_amount) => Ok(CouponEvaluation {
                code: coupon.code,
                discount_type: coupon.discount_type,
                discount_value: coupon.discount_value,
                discount_amount,
                description: coupon.description,
            }),
            Err(CouponRejection::Invalid) => Err(ServiceError::CouponInvalid(
                CouponRejection::Invalid.message(),
            )),
            Err(rejection) => Err(ServiceError::CouponNotApplicable(rejection.message())),
        }
    }

    /// Lenient evaluation for the apply-at-checkout path. Any rejection means
    /// "no discount"; checkout proceeds either way. Database errors still
    /// propagate.
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<Option<CouponEvaluation>, ServiceError> {
        let Some(coupon) = self.find_active(code).await? else {
            return Ok(None);
        };

        Ok(evaluate(&coupon, subtotal, Utc::now())
            .ok()
            .map(|discount_amount| CouponEvaluation {
                code: coupon.code,
                discount_type: coupon.discount_type,
                discount_value: coupon.discount_value,
                discount_amount,
                description: coupon.description,
            }))
    }
}

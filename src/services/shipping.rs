use crate::db::DbPool;
use crate::entities::shipping_rate;
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;

/// Flat rate charged when no rate row exists for the destination country.
pub const FALLBACK_RATE: Decimal = dec!(9.90);

/// Applies the free-shipping threshold to a looked-up rate row.
///
/// A missing row falls back to [`FALLBACK_RATE`]; a threshold of zero never
/// grants free shipping.
pub fn shipping_cost(rate: Option<&shipping_rate::Model>, subtotal: Decimal) -> Decimal {
    match rate {
        Some(row) => {
            if row.free_shipping_threshold > Decimal::ZERO
                && subtotal >= row.free_shipping_threshold
            {
                Decimal::ZERO
            } else {
                row.rate
            }
        }
        None => FALLBACK_RATE,
    }
}

/// Looks up per-country shipping rates for the checkout pipeline and the
/// storefront rate table.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DbPool>,
}

impl ShippingService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Shipping cost for a destination country and cart subtotal.
    #[instrument(skip(self))]
    pub async fn quote(&self, country: &str, subtotal: Decimal) -> Result<Decimal, ServiceError> {
        let rate = shipping_rate::Entity::find()
            .filter(shipping_rate::Column::Country.eq(country))
            .filter(shipping_rate::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?;

        Ok(shipping_cost(rate.as_ref(), subtotal))
    }

    /// Active rate table, ordered by country.
    pub async fn list_active_rates(&self) -> Result<Vec<shipping_rate::Model>, ServiceError> {
        Ok(shipping_rate::Entity::find()
            .filter(shipping_rate::Column::IsActive.eq(true))
            .order_by_asc(shipping_rate::Column::Country)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use test_case::test_case;
    use uuid::Uuid;

    fn rate_row(rate: Decimal, threshold: Decimal) -> shipping_rate::Model {
        shipping_rate::Model {
            id: Uuid::new_v4(),
            country: "Österreich".to_string(),
            rate,
            free_shipping_threshold: threshold,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test_case(dec!(75), dec!(5.90), dec!(60), dec!(0) ; "above threshold is free")]
    #[test_case(dec!(60), dec!(5.90), dec!(60), dec!(0) ; "exactly at threshold is free")]
    #[test_case(dec!(59.99), dec!(5.90), dec!(60), dec!(5.90) ; "below threshold pays flat rate")]
    #[test_case(dec!(500), dec!(5.90), dec!(0), dec!(5.90) ; "zero threshold never grants free shipping")]
    fn threshold_logic(
        subtotal: Decimal,
        rate: Decimal,
        threshold: Decimal,
        expected: Decimal,
    ) {
        let row = rate_row(rate, threshold);
        assert_eq!(shipping_cost(Some(&row), subtotal), expected);
    }

    #[test]
    fn unknown_country_uses_fallback() {
        assert_eq!(shipping_cost(None, dec!(42)), FALLBACK_RATE);
    }

    proptest! {
        #[test]
        fn cost_is_zero_or_flat_rate(
            subtotal_cents in 0i64..100_000_00,
            rate_cents in 1i64..100_00,
            threshold_euro in 1i64..1_000,
        ) {
            let subtotal = Decimal::new(subtotal_cents, 2);
            let rate = Decimal::new(rate_cents, 2);
            let threshold = Decimal::new(threshold_euro, 0);
            let row = rate_row(rate, threshold);

            let cost = shipping_cost(Some(&row), subtotal);
            if subtotal >= threshold {
                prop_assert_eq!(cost, Decimal::ZERO);
            } else {
                prop_assert_eq!(cost, rate);
            }
        }
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a pending checkout session. Completed sessions are immutable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// A time-boxed price quote awaiting payment confirmation. Everything on this
/// row is a snapshot taken at quote time; the finalizer never re-reads the
/// catalog.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Opaque unguessable lookup key handed to the storefront
    #[sea_orm(unique)]
    pub session_token: String,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,

    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub shipping_country: String,

    /// Line-item snapshot (`Vec<LineItem>` as JSON)
    #[sea_orm(column_type = "Json")]
    pub items: Json,

    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,

    pub coupon_code: Option<String>,
    /// Coupon snapshot (`CouponSnapshot` as JSON) when a discount applied
    #[sea_orm(column_type = "Json", nullable)]
    pub coupon_details: Option<Json>,

    pub status: SessionStatus,
    pub is_demo: bool,
    /// Provider-side session reference, recorded once the provider answers
    pub payment_session_id: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decodes the line-item snapshot stored on this session
    pub fn line_items(&self) -> Result<Vec<LineItem>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }

    /// True when the session is past its expiry at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One priced cart line, frozen at quote time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "19.90")]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String, example = "39.80")]
    pub line_total: Decimal,
}

/// Coupon terms frozen at quote time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CouponSnapshot {
    pub code: String,
    pub discount_type: super::coupon::DiscountType,
    #[schema(value_type = String, example = "10")]
    pub discount_value: Decimal,
    pub description: Option<String>,
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fulfillment state, independent of payment state
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Payment state. Only ever moves unpaid/pending -> paid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Durable record of a completed purchase. Created exactly once per checkout
/// session by the order finalizer; the unique `checkout_session_token` and
/// `payment_session_id` columns are what make replays idempotent.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub tracking_number: String,
    /// Sequential per calendar year, e.g. RE-2026-00042
    #[sea_orm(unique)]
    pub invoice_number: String,
    /// Token of the checkout session this order finalized
    #[sea_orm(unique)]
    pub checkout_session_token: String,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,

    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub shipping_country: String,

    /// Line-item snapshot copied verbatim from the session
    #[sea_orm(column_type = "Json")]
    pub items: Json,

    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,

    pub coupon_code: Option<String>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    /// Provider-side payment session reference (unique when present)
    #[sea_orm(unique, nullable)]
    pub payment_session_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment_transaction::Entity")]
    PaymentTransactions,
}

impl Related<super::payment_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decodes the line-item snapshot stored on this order
    pub fn line_items(&self) -> Result<Vec<super::checkout_session::LineItem>, serde_json::Error> {
        serde_json::from_value(self.items.clone())
    }
}

pub mod checkout_session;
pub mod coupon;
pub mod invoice_counter;
pub mod order;
pub mod payment_transaction;
pub mod product;
pub mod shipping_rate;

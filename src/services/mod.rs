// Checkout pipeline
pub mod checkout;
pub mod coupons;
pub mod shipping;

// Payment boundary and finalization
pub mod orders;
pub mod payments;

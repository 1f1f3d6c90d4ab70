use crate::entities::shipping_rate;
use crate::errors::ApiError;
use crate::handlers::common::map_service_error;
use crate::handlers::AppState;
use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ShippingRateResponse {
    #[schema(example = "Österreich")]
    pub country: String,
    #[schema(value_type = String, example = "5.90")]
    pub rate: Decimal,
    /// Subtotal at or above which shipping is free; 0 disables the threshold
    #[schema(value_type = String, example = "60")]
    pub free_shipping_threshold: Decimal,
}

impl From<shipping_rate::Model> for ShippingRateResponse {
    fn from(model: shipping_rate::Model) -> Self {
        Self {
            country: model.country,
            rate: model.rate,
            free_shipping_threshold: model.free_shipping_threshold,
        }
    }
}

/// Active shipping rate table for the storefront, ordered by country.
#[utoipa::path(
    get,
    path = "/api/v1/shipping-rates",
    responses(
        (status = 200, description = "Active rates", body = Vec<ShippingRateResponse>)
    ),
    tag = "Shipping"
)]
pub async fn list_shipping_rates(
    State(state): State<AppState>,
) -> Result<Json<Vec<ShippingRateResponse>>, ApiError> {
    let rates = state
        .services
        .shipping
        .list_active_rates()
        .await
        .map_err(map_service_error)?;

    Ok(Json(rates.into_iter().map(Into::into).collect()))
}

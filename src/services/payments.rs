use crate::entities::checkout_session;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};
use utoipa::ToSchema;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Card numbers the demo gateway accepts.
pub const VALID_TEST_CARDS: [&str; 6] = [
    "4242424242424242",
    "4000056655665556",
    "5555555555554444",
    "2223003122003222",
    "378282246310005",
    "6011111111111117",
];

/// Strips spaces and dashes so `4242 4242 4242 4242` matches the allowlist.
pub fn normalize_card_number(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect()
}

pub fn is_valid_test_card(raw: &str) -> bool {
    VALID_TEST_CARDS.contains(&normalize_card_number(raw).as_str())
}

/// Test card entry shown by the storefront in demo mode
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestCard {
    pub number: String,
    pub brand: String,
    pub description: String,
}

/// Display list for the storefront checkout-status endpoint.
pub fn display_test_cards() -> Vec<TestCard> {
    [
        ("4242 4242 4242 4242", "Visa"),
        ("4000 0566 5566 5556", "Visa (debit)"),
        ("5555 5555 5555 4444", "Mastercard"),
    ]
    .into_iter()
    .map(|(number, brand)| TestCard {
        number: number.to_string(),
        brand: brand.to_string(),
        description: "Successful payment".to_string(),
    })
    .collect()
}

/// Result of creating a hosted checkout at the provider
#[derive(Debug, Clone)]
pub struct ProviderCheckout {
    /// Where the storefront sends the customer next
    pub checkout_url: String,
    /// Provider-side session reference, recorded on the pending session
    pub payment_session_id: Option<String>,
}

/// Result of querying the provider for a session's completion state
#[derive(Debug, Clone)]
pub struct ProviderVerification {
    pub paid: bool,
    pub status: String,
    /// The opaque checkout token carried through provider metadata
    pub checkout_token: Option<String>,
}

/// Boundary to the external payment provider. One implementation is selected
/// at startup and injected; nothing else consults configuration for payment
/// mode.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn is_demo(&self) -> bool;

    /// Creates a hosted checkout for a pending session and returns the
    /// redirect target.
    async fn create_session(
        &self,
        session: &checkout_session::Model,
        origin_url: &str,
    ) -> Result<ProviderCheckout, ServiceError>;

    /// Looks up a provider session by its id.
    async fn verify_session(
        &self,
        payment_session_id: &str,
    ) -> Result<ProviderVerification, ServiceError>;
}

/// Stand-in gateway used when no provider secret is configured. Payments are
/// completed locally with a test card; there is no remote session state.
#[derive(Debug, Default)]
pub struct DemoGateway;

impl DemoGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentProvider for DemoGateway {
    fn is_demo(&self) -> bool {
        true
    }

    async fn create_session(
        &self,
        session: &checkout_session::Model,
        origin_url: &str,
    ) -> Result<ProviderCheckout, ServiceError> {
        Ok(ProviderCheckout {
            checkout_url: format!(
                "{}/checkout/demo?token={}",
                origin_url.trim_end_matches('/'),
                session.session_token
            ),
            payment_session_id: Some(format!("demo_{}", session.session_token)),
        })
    }

    async fn verify_session(
        &self,
        payment_session_id: &str,
    ) -> Result<ProviderVerification, ServiceError> {
        // Demo payments complete through the explicit completion call, never
        // through verification polling.
        Ok(ProviderVerification {
            paid: false,
            status: "requires_demo_completion".to_string(),
            checkout_token: payment_session_id
                .strip_prefix("demo_")
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeSessionPayload {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Hosted-checkout gateway backed by the Stripe REST API.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE.to_string())
    }

    /// Points the gateway at a different API host (used by contract tests).
    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn to_cents(amount: Decimal) -> Result<i64, ServiceError> {
        (amount * dec!(100)).round().to_i64().ok_or_else(|| {
            ServiceError::InternalError(format!("amount {} does not fit in cents", amount))
        })
    }

    /// Builds the form-encoded line items Stripe expects: one entry per cart
    /// line, a negative entry for the discount, one for shipping.
    fn line_item_params(
        session: &checkout_session::Model,
    ) -> Result<Vec<(String, String)>, ServiceError> {
        let items = session.line_items()?;
        let mut params = Vec::new();
        let mut index = 0usize;

        let mut push_line = |params: &mut Vec<(String, String)>,
                             name: &str,
                             unit_amount: i64,
                             quantity: i32| {
            let prefix = format!("line_items[{}]", index);
            params.push((
                format!("{}[price_data][currency]", prefix),
                "eur".to_string(),
            ));
            params.push((
                format!("{}[price_data][product_data][name]", prefix),
                name.to_string(),
            ));
            params.push((
                format!("{}[price_data][unit_amount]", prefix),
                unit_amount.to_string(),
            ));
            params.push((format!("{}[quantity]", prefix), quantity.to_string()));
            index += 1;
        };

        for item in &items {
            push_line(
                &mut params,
                &item.name,
                Self::to_cents(item.unit_price)?,
                item.quantity,
            );
        }

        if session.discount_amount > Decimal::ZERO {
            let label = match &session.coupon_code {
                Some(code) => format!("Rabatt ({})", code),
                None => "Rabatt".to_string(),
            };
            push_line(
                &mut params,
                &label,
                -Self::to_cents(session.discount_amount)?,
                1,
            );
        }

        if session.shipping_cost > Decimal::ZERO {
            push_line(
                &mut params,
                "Versand",
                Self::to_cents(session.shipping_cost)?,
                1,
            );
        }

        Ok(params)
    }
}

#[async_trait]
impl PaymentProvider for StripeGateway {
    fn is_demo(&self) -> bool {
        false
    }

    #[instrument(skip(self, session), fields(session_token = %session.session_token))]
    async fn create_session(
        &self,
        session: &checkout_session::Model,
        origin_url: &str,
    ) -> Result<ProviderCheckout, ServiceError> {
        let origin = origin_url.trim_end_matches('/');
        let mut params = Self::line_item_params(session)?;
        params.push(("mode".to_string(), "payment".to_string()));
        params.push((
            "success_url".to_string(),
            format!(
                "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                origin
            ),
        ));
        params.push((
            "cancel_url".to_string(),
            format!("{}/payment/cancel", origin),
        ));
        params.push((
            "metadata[checkout_token]".to_string(),
            session.session_token.clone(),
        ));

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Provider session creation request failed");
                ServiceError::PaymentProviderError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Provider rejected session creation");
            return Err(ServiceError::PaymentProviderError(format!(
                "session creation failed with status {}",
                status
            )));
        }

        let payload: StripeSessionPayload = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentProviderError(e.to_string()))?;

        let checkout_url = payload.url.ok_or_else(|| {
            ServiceError::PaymentProviderError("provider session has no checkout URL".to_string())
        })?;

        Ok(ProviderCheckout {
            checkout_url,
            payment_session_id: Some(payload.id),
        })
    }

    #[instrument(skip(self))]
    async fn verify_session(
        &self,
        payment_session_id: &str,
    ) -> Result<ProviderVerification, ServiceError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.base_url, payment_session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Provider session lookup request failed");
                ServiceError::PaymentProviderError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ServiceError::PaymentProviderError(format!(
                "session lookup failed with status {}",
                status
            )));
        }

        let payload: StripeSessionPayload = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentProviderError(e.to_string()))?;

        let status = payload.status.unwrap_or_else(|| "unknown".to_string());
        let checkout_token = payload
            .metadata
            .as_ref()
            .and_then(|m| m.get("checkout_token"))
            .and_then(|t| t.as_str())
            .map(str::to_string);

        Ok(ProviderVerification {
            paid: status == "complete",
            status,
            checkout_token,
        })
    }
}

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{PaymentGateway, PixPaymentRequest, ProviderError, ProviderPayment};
use crate::helpers::ANONYMOUS_DONOR;

const DEFAULT_API_URL: &str = "https://api.mercadopago.com";
const TEST_TOKEN_PREFIX: &str = "TEST-";
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub access_token: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let access_token = std::env::var("MP_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let api_url = std::env::var("MP_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let timeout_secs = match std::env::var("MP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("MP_TIMEOUT_SECS must be a number: {}", e))?,
            Err(_) => MIN_TIMEOUT_SECS,
        };

        Ok(Self {
            access_token,
            api_url,
            timeout: Duration::from_secs(timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_test_mode(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|token| token.starts_with(TEST_TOKEN_PREFIX))
    }
}

/// Mercado Pago `/v1/payments` client.
///
/// Without an access token every call fails with `NotConfigured`, which the
/// payment flows treat like any other provider outage.
pub struct MercadoPagoGateway {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<SecretString>,
    test_mode: bool,
}

#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    transaction_amount: Decimal,
    description: String,
    payment_method_id: &'static str,
    payer: Payer<'a>,
}

#[derive(Serialize)]
struct Payer<'a> {
    email: String,
    first_name: &'a str,
    last_name: &'static str,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: Option<serde_json::Value>,
    status: Option<String>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

impl TryFrom<PaymentResponse> for ProviderPayment {
    type Error = ProviderError;

    fn try_from(response: PaymentResponse) -> Result<Self, Self::Error> {
        let id = match response.id {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            _ => {
                return Err(ProviderError::InvalidResponse(
                    "payment id is missing".to_string(),
                ));
            }
        };
        let transaction_data = response
            .point_of_interaction
            .and_then(|poi| poi.transaction_data);
        let (qr_code, qr_code_base64) = match transaction_data {
            Some(data) => (
                data.qr_code.unwrap_or_default(),
                data.qr_code_base64.unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        Ok(ProviderPayment {
            id,
            status: response.status.unwrap_or_else(|| "pending".to_string()),
            qr_code,
            qr_code_base64,
        })
    }
}

impl MercadoPagoGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config
                .access_token
                .clone()
                .map(|token| SecretString::new(token.into())),
            test_mode: config.is_test_mode(),
        })
    }

    fn token(&self) -> Result<&str, ProviderError> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or(ProviderError::NotConfigured)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ProviderPayment, ProviderError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or(body);
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let payment: PaymentResponse = response.json().await?;
        payment.try_into()
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    async fn create_pix_payment(
        &self,
        request: &PixPaymentRequest,
    ) -> Result<ProviderPayment, ProviderError> {
        let token = self.token()?;
        let name = request.donor_name.as_deref();
        let email = request.donor_email.clone().unwrap_or_else(|| {
            let domain = if self.test_mode { "test.com" } else { "gmail.com" };
            format!("donor{}@{}", Utc::now().timestamp_millis(), domain)
        });

        let body = CreatePaymentBody {
            transaction_amount: request.amount,
            description: format!("Donation from {}", name.unwrap_or(ANONYMOUS_DONOR)),
            payment_method_id: "pix",
            payer: Payer {
                email,
                first_name: name.unwrap_or("Donor"),
                last_name: "Anonymous",
            },
        };

        log::info!(
            "Creating PIX payment of {} ({} mode)",
            request.amount,
            if self.test_mode { "test" } else { "production" }
        );

        let payment = self
            .send(
                self.client
                    .post(format!("{}/v1/payments", self.api_url))
                    .bearer_auth(token)
                    .header("X-Idempotency-Key", uuid::Uuid::new_v4().to_string())
                    .json(&body),
            )
            .await?;
        log::info!("Provider created payment {}", payment.id);
        Ok(payment)
    }

    async fn get_payment(&self, id: &str) -> Result<ProviderPayment, ProviderError> {
        let token = self.token()?;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ProviderError::Rejected {
                status: 400,
                message: format!("`{}` is not a provider payment id", id),
            });
        }

        self.send(
            self.client
                .get(format!("{}/v1/payments/{}", self.api_url, id))
                .bearer_auth(token),
        )
        .await
    }
}

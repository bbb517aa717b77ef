mod mercado_pago;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub use mercado_pago::{GatewayConfig, MercadoPagoGateway};

/// Provider status meaning the money has arrived.
pub const PROVIDER_STATUS_APPROVED: &str = "approved";

/// Any reason the provider could not answer. Callers treat every variant
/// the same way and fall back to local data.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Payment provider is not configured")]
    NotConfigured,
    #[error("Payment provider timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixPaymentRequest {
    pub amount: Decimal,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
}

/// A payment as the provider reports it. QR fields are empty strings when
/// the provider did not send them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayment {
    pub id: String,
    pub status: String,
    pub qr_code: String,
    pub qr_code_base64: String,
}

impl ProviderPayment {
    pub fn is_approved(&self) -> bool {
        self.status == PROVIDER_STATUS_APPROVED
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether the configured credentials belong to the provider sandbox.
    fn is_test_mode(&self) -> bool;

    async fn create_pix_payment(
        &self,
        request: &PixPaymentRequest,
    ) -> Result<ProviderPayment, ProviderError>;

    async fn get_payment(&self, id: &str) -> Result<ProviderPayment, ProviderError>;
}

use chrono::{DateTime, Utc};
use common::{
    DonationStatus, MAX_DONATION_AMOUNT, NewDonation, PLACEHOLDER_QR_PNG_BASE64, PixPaymentRequest, ProviderPayment,
    StoreError, demo_pix_code, generate_demo_payment_id, is_demo_payment_id, non_blank,
    round_currency,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::state::AppState;

const STATUS_PENDING: &str = "pending";
const STATUS_APPROVED: &str = "approved";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Amount must be between 0.01 and {}", MAX_DONATION_AMOUNT)]
    InvalidAmount,
    #[error("Payment `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePaymentInput {
    pub amount: Option<Decimal>,
    #[serde(alias = "donorName")]
    pub donor_name: Option<String>,
    #[serde(alias = "donorEmail")]
    pub donor_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub qr_code: String,
    pub qr_code_base64: String,
    pub amount: Decimal,
    pub status: String,
    pub is_test: bool,
    pub used_fallback: bool,
    pub message: String,
}

/// Creates a PIX payment with the provider, or a demo payment when the
/// provider cannot be used, and records it as pending.
///
/// Storage trouble does not block the response: the payer still gets the QR
/// code and later status checks treat a missing row as "not yet recorded".
/// Only a duplicate payment id is reported back, since it means the id
/// source produced a collision.
pub async fn create_payment(
    state: &AppState,
    input: CreatePaymentInput,
) -> Result<CreatedPayment, PaymentError> {
    let amount = input
        .amount
        .map(round_currency)
        .filter(|amount| *amount > Decimal::ZERO && *amount <= MAX_DONATION_AMOUNT)
        .ok_or(PaymentError::InvalidAmount)?;
    let donor_name = non_blank(input.donor_name.as_deref());
    let donor_email = non_blank(input.donor_email.as_deref());
    let is_test = state.gateway.is_test_mode();

    let request = PixPaymentRequest {
        amount,
        donor_name: donor_name.clone(),
        donor_email: donor_email.clone(),
    };
    let (payment, used_fallback) = match state.gateway.create_pix_payment(&request).await {
        Ok(payment) => (payment, false),
        Err(e) => {
            log::warn!("Payment provider unavailable, falling back to demo payment: {}", e);
            let payment = demo_payment(amount);
            log::info!("Demo payment {} created", payment.id);
            (payment, true)
        }
    };

    let donation = NewDonation::new(payment.id.as_str(), amount)
        .with_donor(donor_name, donor_email)
        .with_qr(payment.qr_code.clone(), payment.qr_code_base64.clone());
    match state.db.insert(&donation).await {
        Ok(_) => log::info!("Donation {} recorded as pending", payment.id),
        Err(e @ StoreError::DuplicateKey(_)) => {
            log::error!("Refusing to overwrite donation {}: {}", payment.id, e);
            return Err(e.into());
        }
        Err(e) => log::error!("Failed to record donation {}: {}", payment.id, e),
    }

    let message = if used_fallback {
        "Demo mode. Use \"Simulate payment\" to complete the donation"
    } else if is_test {
        "Test QR code. Use \"Simulate payment\" to complete the donation"
    } else {
        "Production QR code. This is a real payment"
    };

    Ok(CreatedPayment {
        payment_id: payment.id,
        qr_code: payment.qr_code,
        qr_code_base64: payment.qr_code_base64,
        amount,
        status: payment.status,
        is_test,
        used_fallback,
        message: message.to_string(),
    })
}

fn demo_payment(amount: Decimal) -> ProviderPayment {
    let id = generate_demo_payment_id();
    ProviderPayment {
        qr_code: demo_pix_code(&id, amount),
        qr_code_base64: PLACEHOLDER_QR_PNG_BASE64.to_string(),
        status: STATUS_PENDING.to_string(),
        id,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusResolution {
    pub status: String,
    pub is_demo: bool,
    /// Set when the provider could not be asked and `status` comes from the
    /// local record only.
    pub verification_error: Option<String>,
}

/// Works out the current status of a payment from the local record and,
/// for provider payments, the provider itself.
///
/// Demo payments never reach the provider. A locally paid donation is final
/// and answers `approved` without a provider call.
pub async fn resolve_status(
    state: &AppState,
    payment_id: &str,
) -> Result<StatusResolution, PaymentError> {
    let local = state.db.get_by_payment_id(payment_id).await?;

    if is_demo_payment_id(payment_id) {
        log::debug!(
            "Demo payment {} resolved locally: {}",
            payment_id,
            local.as_ref().map_or("not found", |d| d.status.as_str())
        );
        return Ok(StatusResolution {
            status: local
                .map_or(STATUS_PENDING, |d| d.status.as_str())
                .to_string(),
            is_demo: true,
            verification_error: None,
        });
    }

    if local.as_ref().is_some_and(|d| d.status.is_paid()) {
        return Ok(StatusResolution {
            status: STATUS_APPROVED.to_string(),
            is_demo: false,
            verification_error: None,
        });
    }

    match state.gateway.get_payment(payment_id).await {
        Ok(payment) => {
            log::info!("Provider status for {}: {}", payment_id, payment.status);
            if payment.is_approved() && local.is_some() {
                mark_paid(state, payment_id).await?;
            }
            Ok(StatusResolution {
                status: payment.status,
                is_demo: false,
                verification_error: None,
            })
        }
        Err(e) => {
            log::warn!("Could not verify payment {} with provider: {}", payment_id, e);
            Ok(StatusResolution {
                status: local
                    .map_or(STATUS_PENDING, |d| d.status.as_str())
                    .to_string(),
                is_demo: false,
                verification_error: Some(
                    "Could not verify status with the payment provider".to_string(),
                ),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationOutcome {
    Approved { paid_at: DateTime<Utc> },
    AlreadyPaid,
}

/// Marks a recorded donation as paid without asking the provider.
pub async fn simulate_approval(
    state: &AppState,
    payment_id: &str,
) -> Result<SimulationOutcome, PaymentError> {
    let donation = state
        .db
        .get_by_payment_id(payment_id)
        .await?
        .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

    if donation.status.is_paid() {
        return Ok(SimulationOutcome::AlreadyPaid);
    }

    let now = Utc::now();
    if !mark_paid(state, payment_id).await? {
        return Ok(SimulationOutcome::AlreadyPaid);
    }

    let paid_at = state
        .db
        .get_by_payment_id(payment_id)
        .await?
        .and_then(|d| d.paid_at)
        .unwrap_or(now);
    log::info!("Payment {} approved by simulation", payment_id);
    Ok(SimulationOutcome::Approved { paid_at })
}

/// The one-way pending to paid transition. Returns whether this call made it.
async fn mark_paid(state: &AppState, payment_id: &str) -> Result<bool, StoreError> {
    let changed = state
        .db
        .update_status(payment_id, DonationStatus::Paid, Some(Utc::now()))
        .await?;
    if changed {
        log::info!("Payment {} marked as paid", payment_id);
    } else {
        log::info!("Payment {} was already paid", payment_id);
    }
    Ok(changed)
}

/// Provider push notification. Every field is optional so that unexpected
/// payloads are still acknowledged.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    pub id: Option<serde_json::Value>,
}

impl WebhookNotification {
    pub fn payment_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Ignored,
    NotApproved(String),
    Approved,
    AlreadyPaid,
    Failed(String),
}

/// Applies a provider notification. Never fails: the provider retries on
/// anything but a 2xx, and a repeated approval is a no-op.
pub async fn handle_webhook(
    state: &AppState,
    notification: &WebhookNotification,
) -> WebhookOutcome {
    if notification.kind.as_deref() != Some("payment") {
        log::debug!("Ignoring webhook of type {:?}", notification.kind);
        return WebhookOutcome::Ignored;
    }
    let Some(payment_id) = notification.payment_id() else {
        log::warn!("Payment webhook without a payment id");
        return WebhookOutcome::Failed("missing payment id".to_string());
    };
    log::info!(
        "Processing payment webhook for {} ({})",
        payment_id,
        notification.action.as_deref().unwrap_or("no action")
    );

    let payment = match state.gateway.get_payment(&payment_id).await {
        Ok(payment) => payment,
        Err(e) => {
            log::error!("Webhook lookup of payment {} failed: {}", payment_id, e);
            return WebhookOutcome::Failed(e.to_string());
        }
    };
    if !payment.is_approved() {
        log::info!("Webhook status for {}: {}", payment_id, payment.status);
        return WebhookOutcome::NotApproved(payment.status);
    }

    match mark_paid(state, &payment_id).await {
        Ok(true) => WebhookOutcome::Approved,
        Ok(false) => WebhookOutcome::AlreadyPaid,
        Err(e) => {
            log::error!("Webhook could not update payment {}: {}", payment_id, e);
            WebhookOutcome::Failed(e.to_string())
        }
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::helpers::round_currency;

/// Persisted payment state of a donation. `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Paid,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Paid => "paid",
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, DonationStatus::Paid)
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DonationStatus::Pending),
            "paid" => Ok(DonationStatus::Paid),
            other => Err(anyhow::anyhow!("Unknown donation status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub payment_id: String,
    pub amount: Decimal,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub status: DonationStatus,
    pub qr_code: String,
    pub qr_code_base64: String,
    pub pix_code: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Values needed to record a freshly created payment.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub payment_id: String,
    pub amount: Decimal,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub qr_code: String,
    pub qr_code_base64: String,
    pub pix_code: String,
}

impl NewDonation {
    pub fn new(payment_id: impl Into<String>, amount: Decimal) -> Self {
        NewDonation {
            payment_id: payment_id.into(),
            amount: round_currency(amount),
            donor_name: None,
            donor_email: None,
            qr_code: String::new(),
            qr_code_base64: String::new(),
            pix_code: String::new(),
        }
    }

    pub fn with_donor(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.donor_name = name;
        self.donor_email = email;
        self
    }

    /// The PIX copy-and-paste code doubles as the QR payload.
    pub fn with_qr(mut self, qr_code: String, qr_code_base64: String) -> Self {
        self.pix_code = qr_code.clone();
        self.qr_code = qr_code;
        self.qr_code_base64 = qr_code_base64;
        self
    }

    /// Materializes the row a store writes, all timestamps set to `now`.
    pub fn into_donation(self, now: DateTime<Utc>) -> Donation {
        Donation {
            payment_id: self.payment_id,
            amount: self.amount,
            donor_name: self.donor_name,
            donor_email: self.donor_email,
            status: DonationStatus::Pending,
            qr_code: self.qr_code,
            qr_code_base64: self.qr_code_base64,
            pix_code: self.pix_code,
            created_at: now,
            paid_at: None,
            updated_at: now,
        }
    }
}

/// A paid donation as shown on rankings and recent-donation feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorEntry {
    pub donor_name: Option<String>,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DonationStats {
    pub total_amount: Decimal,
    pub count: i64,
}

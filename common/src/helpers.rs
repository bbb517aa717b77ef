use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use rust_decimal::{Decimal, RoundingStrategy};

/// Marks payment ids generated locally when the provider is unavailable.
pub const DEMO_PAYMENT_PREFIX: &str = "DEMO_";

/// Shown in place of a missing donor name on public feeds.
pub const ANONYMOUS_SUPPORTER: &str = "Anonymous supporter";

/// Used in the provider-facing description when no donor name was given.
pub const ANONYMOUS_DONOR: &str = "Anonymous donor";

/// 1x1 transparent PNG handed out as the QR image of demo payments.
pub const PLACEHOLDER_QR_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==";

/// Largest amount every storage engine can hold (`DECIMAL(10, 2)`).
pub const MAX_DONATION_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

const DEMO_PIX_KEY: &str = "demo-donations@example.com";
const DEMO_MERCHANT_NAME: &str = "DEMO PIX DONATION";
const DEMO_MERCHANT_CITY: &str = "SAO PAULO";

pub fn is_demo_payment_id(payment_id: &str) -> bool {
    payment_id.starts_with(DEMO_PAYMENT_PREFIX)
}

/// `DEMO_<unix millis>_<6 lowercase alphanumerics>`
pub fn generate_demo_payment_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "{}{}_{}",
        DEMO_PAYMENT_PREFIX,
        Utc::now().timestamp_millis(),
        suffix
    )
}

/// Builds an EMV "BR Code" copy-and-paste payload for a demo payment.
///
/// The payload is structurally valid (TLV fields plus CRC16 trailer) but
/// points at a placeholder key, so no bank will ever settle it.
pub fn demo_pix_code(payment_id: &str, amount: Decimal) -> String {
    let merchant_account = format!(
        "{}{}",
        emv_field("00", "br.gov.bcb.pix"),
        emv_field("01", DEMO_PIX_KEY)
    );
    let txid: String = payment_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(25)
        .collect();

    let mut payload = String::new();
    payload.push_str(&emv_field("00", "01"));
    payload.push_str(&emv_field("26", &merchant_account));
    payload.push_str(&emv_field("52", "0000"));
    payload.push_str(&emv_field("53", "986"));
    payload.push_str(&emv_field("54", &format!("{:.2}", round_currency(amount))));
    payload.push_str(&emv_field("58", "BR"));
    payload.push_str(&emv_field("59", DEMO_MERCHANT_NAME));
    payload.push_str(&emv_field("60", DEMO_MERCHANT_CITY));
    payload.push_str(&emv_field("62", &emv_field("05", &txid)));
    payload.push_str("6304");

    let crc = crc16_ccitt(payload.as_bytes());
    format!("{}{:04X}", payload, crc)
}

fn emv_field(id: &str, value: &str) -> String {
    format!("{}{:02}{}", id, value.len(), value)
}

/// CRC-16/CCITT-FALSE, the checksum closing every BR Code.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Two decimal places, half away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `R$ 1234,50` style, the way the public feeds display amounts.
pub fn format_brl(amount: Decimal) -> String {
    let plain = format!("{:.2}", round_currency(amount));
    format!("R$ {}", plain.replace('.', ","))
}

/// Trims user input, mapping blank strings to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

//! PayDunya mobile-money webhook handling.
//!
//! PayDunya posts form-urlencoded bodies whose `data` field holds the JSON
//! payload. The payload authenticates itself: its `hash` field must equal
//! the SHA-512 digest of our master key, compared in constant time.

use serde::Deserialize;
use sha2::{Digest, Sha512};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayDunyaError {
    #[error("Missing data field")]
    MissingData,

    #[error("Missing hash in payload")]
    MissingHash,

    #[error("Hash verification failed")]
    InvalidHash,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayDunyaWebhookPayload {
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    pub invoice: PayDunyaInvoice,
    #[serde(default)]
    pub custom_data: Option<serde_json::Value>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayDunyaInvoice {
    pub token: String,
    pub status: String,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Option<serde_json::Value>,
}

impl PayDunyaWebhookPayload {
    pub fn parse(data: &str) -> Result<Self, PayDunyaError> {
        serde_json::from_str(data).map_err(|e| PayDunyaError::InvalidPayload(e.to_string()))
    }

    pub fn is_completed(&self) -> bool {
        self.invoice.status == "completed"
    }

    /// First item name, falling back to the invoice description. Used as the
    /// service label on listing payments.
    pub fn service_name(&self) -> Option<String> {
        let from_items = self.invoice.items.as_ref().and_then(|items| {
            let first = match items {
                serde_json::Value::Array(list) => list.first(),
                serde_json::Value::Object(map) => map.values().next(),
                _ => None,
            }?;
            first.get("name")?.as_str().map(str::to_string)
        });
        from_items.or_else(|| self.invoice.description.clone())
    }

    /// Classify what the payment was for from its custom data.
    pub fn purpose(&self) -> PaymentPurpose {
        let Some(custom) = &self.custom_data else {
            return PaymentPurpose::Unknown;
        };

        let get_str = |key: &str| custom.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let get_i64 = |key: &str| {
            custom.get(key).and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_str().and_then(|s| s.parse::<i64>().ok()))
            })
        };

        if get_str("type").as_deref() == Some("rent") {
            if let (Some(lease_id), Some(period_month), Some(period_year)) =
                (get_i64("lease_id"), get_i64("period_month"), get_i64("period_year"))
            {
                return PaymentPurpose::Rent {
                    lease_id,
                    period_month,
                    period_year,
                };
            }
            return PaymentPurpose::Unknown;
        }

        if let Some(property_id) = get_str("property_id") {
            return PaymentPurpose::ListingBoost { property_id };
        }

        PaymentPurpose::Unknown
    }
}

/// What a completed PayDunya payment settles.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentPurpose {
    Rent {
        lease_id: i64,
        period_month: i64,
        period_year: i64,
    },
    ListingBoost {
        property_id: String,
    },
    Unknown,
}

/// Verify the payload hash against the SHA-512 of the master key.
pub fn verify_master_hash(master_key: &str, received_hash: &str) -> bool {
    let expected = hex::encode(Sha512::digest(master_key.as_bytes()));
    constant_time_eq(expected.as_bytes(), received_hash.to_lowercase().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

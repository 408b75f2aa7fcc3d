//! Stripe subscription webhook handling.
//!
//! The signature scheme is the documented one: the `stripe-signature` header
//! carries `t=<unix>,v1=<hex hmac>` pairs, and the v1 value is an
//! HMAC-SHA256 of `"{t}.{raw body}"` under the endpoint secret. Verification
//! is constant-time and bounds the timestamp to a tolerance window.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use keur_config::StripeConfig;
use keur_database::{BillingCycle, SubscriptionStatus, SubscriptionTier, SubscriptionUpdate};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Acceptable clock skew between Stripe and us, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Missing stripe-signature header")]
    MissingSignature,

    #[error("Malformed stripe-signature header")]
    MalformedSignature,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Verify the webhook signature against the raw request body.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now_unix: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| StripeError::MalformedSignature)?,
                );
            }
            Some(("v1", value)) => {
                signatures.push(hex::decode(value).map_err(|_| StripeError::MalformedSignature)?);
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::MalformedSignature);
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(StripeError::TimestampOutOfTolerance);
    }

    for signature in &signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| StripeError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(StripeError::InvalidSignature)
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, StripeError> {
        serde_json::from_slice(payload).map_err(|e| StripeError::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    #[serde(default)]
    customer: Option<String>,
    status: String,
    #[serde(default)]
    trial_end: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionItems {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: PriceObject,
}

#[derive(Debug, Deserialize)]
struct PriceObject {
    id: String,
    #[serde(default)]
    recurring: Option<Recurring>,
}

#[derive(Debug, Deserialize)]
struct Recurring {
    interval: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    billing_reason: Option<String>,
}

/// How an interpreted event locates its team.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamSelector {
    PublicId(String),
    StripeCustomer(String),
}

/// A subscription state change extracted from a webhook event.
#[derive(Debug)]
pub struct SubscriptionChange {
    pub selector: TeamSelector,
    pub update: SubscriptionUpdate,
}

/// Map a Stripe subscription status onto the states the teams table allows.
pub fn map_subscription_status(status: &str) -> SubscriptionStatus {
    match status {
        "active" => SubscriptionStatus::Active,
        "trialing" => SubscriptionStatus::Trialing,
        "past_due" | "paused" => SubscriptionStatus::PastDue,
        "canceled" | "incomplete_expired" => SubscriptionStatus::Canceled,
        "unpaid" => SubscriptionStatus::Unpaid,
        "incomplete" => SubscriptionStatus::Incomplete,
        _ => SubscriptionStatus::PastDue,
    }
}

/// Resolve the tier from checkout metadata first, then the price ID tables.
pub fn resolve_tier(
    metadata: &HashMap<String, String>,
    price_id: Option<&str>,
    config: &StripeConfig,
) -> Option<SubscriptionTier> {
    if let Some(tier) = metadata.get("plan_id").and_then(|p| SubscriptionTier::parse(p)) {
        return Some(tier);
    }

    let price_id = price_id?;
    let tables = [
        (&config.price_starter, SubscriptionTier::Starter),
        (&config.price_pro, SubscriptionTier::Pro),
        (&config.price_enterprise, SubscriptionTier::Enterprise),
    ];
    for (prices, tier) in tables {
        if prices.iter().any(|p| p == price_id) {
            return Some(tier);
        }
    }
    None
}

fn trial_end_to_rfc3339(trial_end: Option<i64>) -> Option<String> {
    trial_end
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
}

/// Interpret an event into the subscription change it implies, if any.
/// Unhandled event types interpret to `None`.
pub fn interpret_event(
    event: &StripeEvent,
    config: &StripeConfig,
    now: DateTime<Utc>,
) -> Result<Option<SubscriptionChange>, StripeError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
                .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

            if session.mode.as_deref() != Some("subscription") {
                return Ok(None);
            }
            let Some(team_public_id) = session.metadata.get("team_id").cloned() else {
                warn!(event_id = %event.id, "checkout session missing team_id metadata");
                return Ok(None);
            };

            let tier = resolve_tier(&session.metadata, None, config)
                .unwrap_or(SubscriptionTier::Starter);
            let billing_cycle = match session.metadata.get("interval").map(String::as_str) {
                Some("annual") | Some("year") => BillingCycle::Annual,
                _ => BillingCycle::Monthly,
            };

            Ok(Some(SubscriptionChange {
                selector: TeamSelector::PublicId(team_public_id),
                update: SubscriptionUpdate {
                    stripe_customer_id: session.customer,
                    stripe_subscription_id: session.subscription,
                    subscription_status: Some(SubscriptionStatus::Active),
                    subscription_tier: Some(tier),
                    billing_cycle: Some(billing_cycle),
                    subscription_trial_ends_at: Some(None),
                    subscription_started_at: Some(now.to_rfc3339()),
                    trial_used: None,
                },
            }))
        }

        "customer.subscription.updated" => {
            let subscription: SubscriptionObject =
                serde_json::from_value(event.data.object.clone())
                    .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

            let status = map_subscription_status(&subscription.status);
            let price_id = subscription.items.data.first().map(|i| i.price.id.as_str());
            let tier = resolve_tier(&subscription.metadata, price_id, config);
            let cycle = subscription
                .items
                .data
                .first()
                .and_then(|i| i.price.recurring.as_ref())
                .map(|r| match r.interval.as_str() {
                    "year" => BillingCycle::Annual,
                    _ => BillingCycle::Monthly,
                });

            let selector = match subscription.metadata.get("team_id") {
                Some(team_id) => TeamSelector::PublicId(team_id.clone()),
                None => {
                    let customer = subscription
                        .customer
                        .ok_or_else(|| {
                            StripeError::InvalidPayload("subscription without customer".to_string())
                        })?;
                    TeamSelector::StripeCustomer(customer)
                }
            };

            Ok(Some(SubscriptionChange {
                selector,
                update: SubscriptionUpdate {
                    stripe_customer_id: None,
                    stripe_subscription_id: Some(subscription.id),
                    subscription_status: Some(status),
                    subscription_tier: tier,
                    billing_cycle: cycle,
                    subscription_trial_ends_at: Some(trial_end_to_rfc3339(subscription.trial_end)),
                    subscription_started_at: None,
                    trial_used: (status == SubscriptionStatus::Trialing).then_some(true),
                },
            }))
        }

        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject =
                serde_json::from_value(event.data.object.clone())
                    .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

            let selector = match subscription.metadata.get("team_id") {
                Some(team_id) => TeamSelector::PublicId(team_id.clone()),
                None => {
                    let customer = subscription
                        .customer
                        .ok_or_else(|| {
                            StripeError::InvalidPayload("subscription without customer".to_string())
                        })?;
                    TeamSelector::StripeCustomer(customer)
                }
            };

            Ok(Some(SubscriptionChange {
                selector,
                update: SubscriptionUpdate {
                    subscription_status: Some(SubscriptionStatus::Canceled),
                    ..Default::default()
                },
            }))
        }

        "invoice.payment_failed" => {
            let invoice: InvoiceObject = serde_json::from_value(event.data.object.clone())
                .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;
            let customer = invoice.customer.ok_or_else(|| {
                StripeError::InvalidPayload("invoice without customer".to_string())
            })?;

            Ok(Some(SubscriptionChange {
                selector: TeamSelector::StripeCustomer(customer),
                update: SubscriptionUpdate {
                    subscription_status: Some(SubscriptionStatus::PastDue),
                    ..Default::default()
                },
            }))
        }

        "invoice.payment_succeeded" => {
            let invoice: InvoiceObject = serde_json::from_value(event.data.object.clone())
                .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

            // The initial invoice is covered by checkout.session.completed.
            if invoice.billing_reason.as_deref() == Some("subscription_create") {
                return Ok(None);
            }
            let customer = invoice.customer.ok_or_else(|| {
                StripeError::InvalidPayload("invoice without customer".to_string())
            })?;

            Ok(Some(SubscriptionChange {
                selector: TeamSelector::StripeCustomer(customer),
                update: SubscriptionUpdate {
                    subscription_status: Some(SubscriptionStatus::Active),
                    ..Default::default()
                },
            }))
        }

        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={signature}")
    }

    fn test_config() -> StripeConfig {
        StripeConfig {
            webhook_secret: Some(SECRET.to_string()),
            price_starter: vec!["price_starter_xof".to_string()],
            price_pro: vec!["price_pro_xof".to_string(), "price_pro_eur".to_string()],
            price_enterprise: vec!["price_ent_xof".to_string()],
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, 1_700_000_000, SECRET);
        assert!(verify_signature(SECRET, &header, payload.as_bytes(), 1_700_000_100).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, 1_700_000_000, "whsec_other");
        assert!(matches!(
            verify_signature(SECRET, &header, payload.as_bytes(), 1_700_000_000),
            Err(StripeError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(r#"{"id":"evt_1"}"#, 1_700_000_000, SECRET);
        assert!(matches!(
            verify_signature(SECRET, &header, br#"{"id":"evt_2"}"#, 1_700_000_000),
            Err(StripeError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, 1_700_000_000, SECRET);
        assert!(matches!(
            verify_signature(SECRET, &header, payload.as_bytes(), 1_700_000_000 + 301),
            Err(StripeError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(matches!(
            verify_signature(SECRET, "not-a-header", b"{}", 0),
            Err(StripeError::MalformedSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, "t=abc,v1=00", b"{}", 0),
            Err(StripeError::MalformedSignature)
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_subscription_status("active"), SubscriptionStatus::Active);
        assert_eq!(map_subscription_status("paused"), SubscriptionStatus::PastDue);
        assert_eq!(
            map_subscription_status("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            map_subscription_status("something_new"),
            SubscriptionStatus::PastDue
        );
    }

    #[test]
    fn test_tier_resolution_prefers_metadata() {
        let config = test_config();
        let mut metadata = HashMap::new();
        metadata.insert("plan_id".to_string(), "enterprise".to_string());

        assert_eq!(
            resolve_tier(&metadata, Some("price_pro_xof"), &config),
            Some(SubscriptionTier::Enterprise)
        );
        assert_eq!(
            resolve_tier(&HashMap::new(), Some("price_pro_eur"), &config),
            Some(SubscriptionTier::Pro)
        );
        assert_eq!(resolve_tier(&HashMap::new(), Some("price_unknown"), &config), None);
    }

    #[test]
    fn test_interpret_checkout_completed() {
        let event = StripeEvent {
            id: "evt_1".to_string(),
            event_type: "checkout.session.completed".to_string(),
            data: StripeEventData {
                object: json!({
                    "mode": "subscription",
                    "customer": "cus_123",
                    "subscription": "sub_456",
                    "metadata": {"team_id": "team_pub", "plan_id": "pro", "interval": "annual"}
                }),
            },
        };

        let change = interpret_event(&event, &test_config(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(change.selector, TeamSelector::PublicId("team_pub".to_string()));
        assert_eq!(
            change.update.subscription_tier,
            Some(SubscriptionTier::Pro)
        );
        assert_eq!(change.update.billing_cycle, Some(BillingCycle::Annual));
        assert_eq!(
            change.update.subscription_status,
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn test_interpret_renewal_skips_initial_invoice() {
        let initial = StripeEvent {
            id: "evt_2".to_string(),
            event_type: "invoice.payment_succeeded".to_string(),
            data: StripeEventData {
                object: json!({"customer": "cus_123", "billing_reason": "subscription_create"}),
            },
        };
        assert!(interpret_event(&initial, &test_config(), Utc::now())
            .unwrap()
            .is_none());

        let renewal = StripeEvent {
            id: "evt_3".to_string(),
            event_type: "invoice.payment_succeeded".to_string(),
            data: StripeEventData {
                object: json!({"customer": "cus_123", "billing_reason": "subscription_cycle"}),
            },
        };
        let change = interpret_event(&renewal, &test_config(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(
            change.selector,
            TeamSelector::StripeCustomer("cus_123".to_string())
        );
        assert_eq!(
            change.update.subscription_status,
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn test_interpret_trialing_marks_trial_used() {
        let event = StripeEvent {
            id: "evt_4".to_string(),
            event_type: "customer.subscription.updated".to_string(),
            data: StripeEventData {
                object: json!({
                    "id": "sub_456",
                    "customer": "cus_123",
                    "status": "trialing",
                    "trial_end": 1_700_000_000,
                    "items": {"data": [{"price": {"id": "price_pro_xof", "recurring": {"interval": "month"}}}]}
                }),
            },
        };

        let change = interpret_event(&event, &test_config(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(change.update.trial_used, Some(true));
        assert_eq!(change.update.subscription_tier, Some(SubscriptionTier::Pro));
        assert_eq!(change.update.billing_cycle, Some(BillingCycle::Monthly));
        assert!(matches!(
            change.update.subscription_trial_ends_at,
            Some(Some(_))
        ));
    }

    #[test]
    fn test_unhandled_event_is_acknowledged() {
        let event = StripeEvent {
            id: "evt_5".to_string(),
            event_type: "charge.refunded".to_string(),
            data: StripeEventData { object: json!({}) },
        };
        assert!(interpret_event(&event, &test_config(), Utc::now())
            .unwrap()
            .is_none());
    }
}

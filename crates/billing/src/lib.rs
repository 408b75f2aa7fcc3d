//! Keurimmo Billing Crate
//!
//! Webhook verification and event interpretation for the two payment
//! providers: Stripe for team subscriptions and PayDunya for mobile-money
//! rent and listing payments. This crate is pure; applying the interpreted
//! changes to the database belongs to the gateway.

pub mod paydunya;
pub mod stripe;

pub use paydunya::{verify_master_hash, PayDunyaError, PayDunyaWebhookPayload, PaymentPurpose};
pub use stripe::{
    interpret_event, verify_signature, StripeError, StripeEvent, SubscriptionChange, TeamSelector,
};

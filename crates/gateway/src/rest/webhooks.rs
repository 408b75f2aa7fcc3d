//! Payment provider webhook endpoints.
//!
//! Stripe events drive team subscription state; PayDunya events settle rent
//! periods and record listing-boost payments. Both verify authenticity
//! before touching anything, and PayDunya always gets a 200 once the hash
//! checks out so the provider stops redelivering.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Form, Json, Router,
};
use chrono::Utc;
use keur_billing::{
    interpret_event, verify_master_hash, verify_signature, PayDunyaWebhookPayload,
    PaymentPurpose, StripeEvent, TeamSelector,
};
use keur_database::{ListingPayment, PaymentDetails};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

pub fn create_webhook_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/webhooks/stripe/subscriptions", post(stripe_webhook))
        .route("/api/paydunya/webhook", post(paydunya_webhook))
}

#[derive(Debug, Deserialize)]
pub struct PayDunyaForm {
    pub data: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/webhooks/stripe/subscriptions",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Signature or payload invalid"),
        (status = 500, description = "Webhook secret not configured")
    )
)]
pub async fn stripe_webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Json<Value>> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| {
            GatewayError::InternalError("Stripe webhook secret not configured".to_string())
        })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            GatewayError::InvalidRequest("Missing stripe-signature header".to_string())
        })?;

    verify_signature(secret, signature, &body, Utc::now().timestamp())
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let event =
        StripeEvent::parse(&body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let change = interpret_event(&event, &state.config.stripe, Utc::now())
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    if let Some(change) = change {
        let team = match &change.selector {
            TeamSelector::PublicId(public_id) => state.teams.find_by_public_id(public_id).await?,
            TeamSelector::StripeCustomer(customer_id) => {
                state.teams.find_by_stripe_customer(customer_id).await?
            }
        };

        match team {
            Some(team) => {
                state
                    .teams
                    .update_subscription(team.id, &change.update)
                    .await?;
                info!(
                    team_id = team.id,
                    event_type = %event.event_type,
                    "applied subscription change"
                );
            }
            None => {
                warn!(
                    selector = ?change.selector,
                    event_type = %event.event_type,
                    "subscription event for unknown team"
                );
            }
        }
    }

    Ok(Json(json!({ "received": true })))
}

#[utoipa::path(
    post,
    path = "/api/paydunya/webhook",
    tag = "webhooks",
    responses(
        (status = 200, description = "Notification accepted"),
        (status = 400, description = "Payload missing or malformed"),
        (status = 401, description = "Master hash mismatch"),
        (status = 500, description = "Master key not configured")
    )
)]
pub async fn paydunya_webhook(
    State(state): State<Arc<GatewayState>>,
    Form(form): Form<PayDunyaForm>,
) -> GatewayResult<Json<Value>> {
    let data = form
        .data
        .ok_or_else(|| GatewayError::InvalidRequest("Missing data field".to_string()))?;

    let payload = PayDunyaWebhookPayload::parse(&data)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let hash = payload
        .hash
        .as_deref()
        .ok_or_else(|| GatewayError::InvalidRequest("Missing payload hash".to_string()))?;

    let master_key = state
        .config
        .paydunya
        .master_key
        .as_deref()
        .ok_or_else(|| {
            GatewayError::InternalError("PayDunya master key not configured".to_string())
        })?;

    if !verify_master_hash(master_key, hash) {
        return Err(GatewayError::AuthenticationFailed(
            "PayDunya hash mismatch".to_string(),
        ));
    }

    // Authenticated from here on: always acknowledge so PayDunya stops
    // redelivering, and log anything that could not be applied.
    if !payload.is_completed() {
        info!(
            token = %payload.invoice.token,
            status = %payload.invoice.status,
            "ignoring non-completed paydunya notification"
        );
        return Ok(Json(json!({ "received": true })));
    }

    match payload.purpose() {
        PaymentPurpose::Rent {
            lease_id,
            period_month,
            period_year,
        } => {
            let details = PaymentDetails {
                amount_paid: payload.invoice.total_amount.unwrap_or(0.0).round() as i64,
                payment_method: "paydunya".to_string(),
                payment_ref: Some(payload.invoice.token.clone()),
            };

            match state
                .payment_service
                .settle_rent_payment(lease_id, period_year, period_month, &details)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    info!(lease_id, token = %payload.invoice.token, "rent already settled");
                }
                Err(e) => {
                    error!(lease_id, error = %e, "failed to settle rent payment");
                    return Ok(Json(json!({ "received": true, "error": e.to_string() })));
                }
            }
        }
        PaymentPurpose::ListingBoost { property_id } => {
            let payment = ListingPayment {
                payment_ref: payload.invoice.token.clone(),
                payment_amount: payload.invoice.total_amount.unwrap_or(0.0).round() as i64,
                service_name: payload.service_name(),
            };

            if let Err(e) = state
                .properties
                .record_listing_payment(&property_id, &payment)
                .await
            {
                error!(property_id = %property_id, error = %e, "failed to record listing payment");
                return Ok(Json(json!({ "received": true, "error": e.to_string() })));
            }
        }
        PaymentPurpose::Unknown => {
            warn!(token = %payload.invoice.token, "paydunya payment with unknown purpose");
        }
    }

    Ok(Json(json!({ "received": true })))
}

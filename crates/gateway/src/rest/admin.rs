//! Operational endpoints: scheduled jobs, listing moderation and cache
//! metrics.
//!
//! The job and moderation routes are guarded by a shared secret in the
//! `x-admin-secret` header rather than a user session; schedulers and the
//! back office call them directly.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use keur_database::ValidationStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

pub fn create_admin_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/admin/catch-up-ged", post(catch_up_documents))
        .route(
            "/api/admin/generate-monthly-rentals",
            post(generate_monthly_rentals),
        )
        .route(
            "/api/admin/properties/:public_id/validate",
            post(validate_property),
        )
        .route("/api/cache-metrics", get(cache_metrics))
}

fn require_admin(state: &GatewayState, headers: &HeaderMap) -> GatewayResult<()> {
    let secret = state
        .config
        .admin
        .catch_up_secret
        .as_deref()
        .ok_or_else(|| {
            GatewayError::InternalError("Admin secret not configured".to_string())
        })?;

    let provided = headers
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided != secret {
        return Err(GatewayError::AuthenticationFailed(
            "Invalid admin secret".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePropertyBody {
    pub decision: String,
}

#[utoipa::path(
    post,
    path = "/api/admin/catch-up-ged",
    tag = "admin",
    responses(
        (status = 200, description = "Backfill report"),
        (status = 401, description = "Invalid admin secret")
    )
)]
pub async fn catch_up_documents(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> GatewayResult<Json<keur_rentals::CatchUpReport>> {
    require_admin(&state, &headers)?;

    let report = state.document_service.catch_up().await?;
    info!(
        leases = report.leases_generated,
        receipts = report.receipts_generated,
        errors = report.errors.len(),
        "document catch-up complete"
    );
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/admin/generate-monthly-rentals",
    tag = "admin",
    responses(
        (status = 200, description = "Generation report plus overdue count"),
        (status = 401, description = "Invalid admin secret")
    )
)]
pub async fn generate_monthly_rentals(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> GatewayResult<Json<Value>> {
    require_admin(&state, &headers)?;

    let today = Utc::now().date_naive();
    let report = state.generation_service.generate_current_period(today).await?;
    let overdue = state.generation_service.mark_overdue(today).await?;

    Ok(Json(json!({
        "generation": report,
        "markedOverdue": overdue,
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/properties/{public_id}/validate",
    tag = "admin",
    params(("public_id" = String, Path, description = "Property public id")),
    request_body = ValidatePropertyBody,
    responses(
        (status = 200, description = "Decision applied"),
        (status = 409, description = "Listing is not awaiting validation")
    )
)]
pub async fn validate_property(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(body): Json<ValidatePropertyBody>,
) -> GatewayResult<Json<Value>> {
    require_admin(&state, &headers)?;

    let decision = match body.decision.as_str() {
        "verified" => ValidationStatus::Verified,
        "rejected" => ValidationStatus::Rejected,
        other => {
            return Err(GatewayError::InvalidRequest(format!(
                "unknown decision: {other}"
            )))
        }
    };

    state
        .properties
        .set_validation_status(&public_id, decision)
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    get,
    path = "/api/cache-metrics",
    tag = "admin",
    responses(
        (status = 200, description = "Cache hit and latency counters")
    )
)]
pub async fn cache_metrics(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "metrics": state.cache.metrics(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

//! Tenant portal endpoints.
//!
//! The public routes exchange a magic-link token for a session; the
//! authenticated routes serve the dashboard behind that session.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::{access_context, extract_lease_id, AuthContext};
use crate::rest::rentals::MessageResponse;
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub token: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub tenant_name: String,
    pub property_address: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_token: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TenantMessageBody {
    pub body: String,
}

pub fn create_public_tenant_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/tenant/validate", post(validate))
        .route("/api/tenant/verify", post(verify))
        .route("/api/tenant/resume", post(resume))
}

pub fn create_tenant_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/tenant/dashboard", get(dashboard))
        .route("/api/tenant/payments", get(payments))
        .route("/api/tenant/messages", get(list_messages).post(post_message))
        .route("/api/tenant/messages/read", post(mark_messages_read))
}

#[utoipa::path(
    post,
    path = "/api/tenant/validate",
    tag = "tenant",
    request_body = TokenBody,
    responses(
        (status = 200, description = "Token is valid", body = ValidateResponse),
        (status = 401, description = "Token invalid, expired or revoked")
    )
)]
pub async fn validate(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<TokenBody>,
) -> GatewayResult<Json<ValidateResponse>> {
    let lease = state
        .magic_link
        .validate_token(&body.token, access_context(&headers))
        .await?;

    Ok(Json(ValidateResponse {
        tenant_name: lease.tenant_name,
        property_address: lease.property_address,
        verified: lease.token_verified,
    }))
}

#[utoipa::path(
    post,
    path = "/api/tenant/verify",
    tag = "tenant",
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Identity confirmed, session issued", body = SessionResponse),
        (status = 401, description = "Name mismatch or token no longer valid")
    )
)]
pub async fn verify(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyBody>,
) -> GatewayResult<Json<SessionResponse>> {
    let session = state
        .magic_link
        .verify_identity(&body.token, &body.last_name, access_context(&headers))
        .await?;

    Ok(Json(SessionResponse {
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/api/tenant/resume",
    tag = "tenant",
    request_body = TokenBody,
    responses(
        (status = 200, description = "New session for an already-verified token", body = SessionResponse),
        (status = 401, description = "Token not verified or no longer valid")
    )
)]
pub async fn resume(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<TokenBody>,
) -> GatewayResult<Json<SessionResponse>> {
    let session = state
        .magic_link
        .resume_session(&body.token, access_context(&headers))
        .await?;

    Ok(Json(SessionResponse {
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/api/tenant/dashboard",
    tag = "tenant",
    responses(
        (status = 200, description = "Lease and payment overview"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn dashboard(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
) -> GatewayResult<Json<keur_rentals::TenantDashboard>> {
    let lease_id = extract_lease_id(auth)?;
    Ok(Json(state.tenant_portal.dashboard(lease_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/tenant/payments",
    tag = "tenant",
    responses(
        (status = 200, description = "Payment history for the lease")
    )
)]
pub async fn payments(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
) -> GatewayResult<Json<Vec<crate::rest::rentals::TransactionResponse>>> {
    let lease_id = extract_lease_id(auth)?;
    let payments = state.tenant_portal.payments(lease_id).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/tenant/messages",
    tag = "tenant",
    responses(
        (status = 200, description = "Message thread", body = [MessageResponse])
    )
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let lease_id = extract_lease_id(auth)?;
    let messages = state.tenant_portal.messages(lease_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/tenant/messages",
    tag = "tenant",
    request_body = TenantMessageBody,
    responses(
        (status = 201, description = "Message posted", body = MessageResponse)
    )
)]
pub async fn post_message(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<TenantMessageBody>,
) -> GatewayResult<(axum::http::StatusCode, Json<MessageResponse>)> {
    let lease_id = extract_lease_id(auth)?;
    let message = state.tenant_portal.post_message(lease_id, &body.body).await?;
    Ok((axum::http::StatusCode::CREATED, Json(message.into())))
}

#[utoipa::path(
    post,
    path = "/api/tenant/messages/read",
    tag = "tenant",
    responses(
        (status = 200, description = "Owner messages marked read")
    )
)]
pub async fn mark_messages_read(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
) -> GatewayResult<Json<serde_json::Value>> {
    let lease_id = extract_lease_id(auth)?;
    let marked = state.tenant_portal.mark_messages_read(lease_id).await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

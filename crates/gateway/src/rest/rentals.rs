//! Rental management endpoints for owner accounts.
//!
//! Every route resolves a team context first; writes additionally require a
//! role that can manage rentals.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use keur_database::{CreateLeaseRequest, Lease, LeaseMessage, LeaseStatus, MessageSender, RentalTransaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{access_context, require_rental_manager, team_context, AuthContext};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaseResponse {
    pub id: String,
    pub tenant_name: String,
    pub tenant_phone: Option<String>,
    pub tenant_email: Option<String>,
    pub property_address: Option<String>,
    pub monthly_amount: i64,
    pub billing_day: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub status: String,
    pub token_verified: bool,
    pub last_access_at: Option<String>,
    pub created_at: String,
}

impl From<Lease> for LeaseResponse {
    fn from(lease: Lease) -> Self {
        Self {
            id: lease.public_id,
            tenant_name: lease.tenant_name,
            tenant_phone: lease.tenant_phone,
            tenant_email: lease.tenant_email,
            property_address: lease.property_address,
            monthly_amount: lease.monthly_amount,
            billing_day: lease.billing_day,
            start_date: lease.start_date,
            end_date: lease.end_date,
            status: lease.status.to_string(),
            token_verified: lease.token_verified,
            last_access_at: lease.last_access_at,
            created_at: lease.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: i64,
    pub lease_id: i64,
    pub period_month: i64,
    pub period_year: i64,
    pub status: String,
    pub amount_due: i64,
    pub amount_paid: Option<i64>,
    pub paid_at: Option<String>,
    pub payment_method: Option<String>,
    pub payment_ref: Option<String>,
    pub created_at: String,
}

impl From<RentalTransaction> for TransactionResponse {
    fn from(tx: RentalTransaction) -> Self {
        Self {
            id: tx.id,
            lease_id: tx.lease_id,
            period_month: tx.period_month,
            period_year: tx.period_year,
            status: tx.status.to_string(),
            amount_due: tx.amount_due,
            amount_paid: tx.amount_paid,
            paid_at: tx.paid_at,
            payment_method: tx.payment_method,
            payment_ref: tx.payment_ref,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub sender: String,
    pub body: String,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<LeaseMessage> for MessageResponse {
    fn from(message: LeaseMessage) -> Self {
        Self {
            id: message.id,
            sender: message.sender.to_string(),
            body: message.body,
            read_at: message.read_at,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeaseBody {
    pub property_id: Option<i64>,
    pub tenant_name: String,
    pub tenant_phone: Option<String>,
    pub tenant_email: Option<String>,
    pub property_address: Option<String>,
    pub monthly_amount: i64,
    pub billing_day: Option<i64>,
    pub start_date: String,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostMessageBody {
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentBody {
    pub amount_paid: i64,
    pub payment_method: String,
    pub payment_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLinkResponse {
    pub token: String,
    pub expires_at: String,
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaseListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevenueHistoryQuery {
    pub months: Option<i64>,
}

pub fn create_rental_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/rentals/leases", get(list_leases).post(create_lease))
        .route("/api/rentals/leases/:public_id", get(lease_detail))
        .route("/api/rentals/leases/:public_id/terminate", post(terminate_lease))
        .route(
            "/api/rentals/leases/:public_id/messages",
            get(list_messages).post(post_message),
        )
        .route(
            "/api/rentals/leases/:public_id/messages/read",
            post(mark_messages_read),
        )
        .route("/api/rentals/leases/:public_id/access-link", post(issue_access_link))
        .route("/api/rentals/transactions", get(list_transactions))
        .route("/api/rentals/transactions/:id/pay", post(record_payment))
        .route("/api/rentals/stats", get(rental_stats))
        .route("/api/rentals/late-payments", get(late_payments))
        .route("/api/rentals/advanced-stats", get(advanced_stats))
        .route("/api/rentals/revenue-history", get(revenue_history))
}

/// Resolve a lease public id into the row, scoped to the acting team.
async fn resolve_lease(
    state: &GatewayState,
    team_id: i64,
    public_id: &str,
) -> GatewayResult<Lease> {
    state
        .leases
        .find_by_public_id(team_id, public_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Lease not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/rentals/leases",
    tag = "rentals",
    params(("status" = Option<String>, Query, description = "Filter: active or terminated")),
    responses(
        (status = 200, description = "Leases for the team", body = [LeaseResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_leases(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Query(query): Query<LeaseListQuery>,
) -> GatewayResult<Json<Vec<LeaseResponse>>> {
    let ctx = team_context(&state, auth, &headers).await?;

    let status = match query.status.as_deref() {
        Some("active") => Some(LeaseStatus::Active),
        Some("terminated") => Some(LeaseStatus::Terminated),
        Some(other) => {
            return Err(GatewayError::InvalidRequest(format!(
                "unknown lease status: {other}"
            )))
        }
        None => None,
    };

    let leases = state.read_service.leases(ctx.team.id, status).await?;
    Ok(Json(leases.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/rentals/leases",
    tag = "rentals",
    request_body = CreateLeaseBody,
    responses(
        (status = 201, description = "Lease created", body = LeaseResponse),
        (status = 403, description = "Role cannot manage rentals")
    )
)]
pub async fn create_lease(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Json(body): Json<CreateLeaseBody>,
) -> GatewayResult<(StatusCode, Json<LeaseResponse>)> {
    let ctx = team_context(&state, auth, &headers).await?;
    require_rental_manager(&ctx)?;

    let request = CreateLeaseRequest {
        property_id: body.property_id,
        tenant_name: body.tenant_name,
        tenant_phone: body.tenant_phone,
        tenant_email: body.tenant_email,
        property_address: body.property_address,
        monthly_amount: body.monthly_amount,
        billing_day: body.billing_day,
        start_date: body.start_date,
        end_date: body.end_date,
    };

    let lease = state
        .lease_service
        .create(ctx.team.id, ctx.user_id, &request)
        .await?;

    Ok((StatusCode::CREATED, Json(lease.into())))
}

#[utoipa::path(
    get,
    path = "/api/rentals/leases/{public_id}",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    responses(
        (status = 200, description = "Lease detail", body = LeaseResponse),
        (status = 404, description = "Lease not found")
    )
)]
pub async fn lease_detail(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> GatewayResult<Json<LeaseResponse>> {
    let ctx = team_context(&state, auth, &headers).await?;
    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;

    let detail = state.read_service.lease_detail(ctx.team.id, lease.id).await?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    post,
    path = "/api/rentals/leases/{public_id}/terminate",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    responses(
        (status = 204, description = "Lease terminated"),
        (status = 404, description = "Lease not found")
    )
)]
pub async fn terminate_lease(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> GatewayResult<StatusCode> {
    let ctx = team_context(&state, auth, &headers).await?;
    require_rental_manager(&ctx)?;

    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;
    state.lease_service.terminate(ctx.team.id, lease.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/rentals/leases/{public_id}/messages",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    responses(
        (status = 200, description = "Message thread", body = [MessageResponse])
    )
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let ctx = team_context(&state, auth, &headers).await?;
    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;

    let messages = state
        .read_service
        .lease_messages(ctx.team.id, lease.id)
        .await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/rentals/leases/{public_id}/messages",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    request_body = PostMessageBody,
    responses(
        (status = 201, description = "Message posted", body = MessageResponse)
    )
)]
pub async fn post_message(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(body): Json<PostMessageBody>,
) -> GatewayResult<(StatusCode, Json<MessageResponse>)> {
    let ctx = team_context(&state, auth, &headers).await?;
    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;

    let message = state
        .read_service
        .post_message(ctx.team.id, lease.id, MessageSender::Owner, &body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

#[utoipa::path(
    post,
    path = "/api/rentals/leases/{public_id}/messages/read",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    responses(
        (status = 200, description = "Tenant messages marked read")
    )
)]
pub async fn mark_messages_read(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> GatewayResult<Json<serde_json::Value>> {
    let ctx = team_context(&state, auth, &headers).await?;
    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;

    let marked = state
        .read_service
        .mark_messages_read(ctx.team.id, lease.id, MessageSender::Owner)
        .await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

#[utoipa::path(
    post,
    path = "/api/rentals/leases/{public_id}/access-link",
    tag = "rentals",
    params(("public_id" = String, Path, description = "Lease public id")),
    responses(
        (status = 200, description = "Access token issued", body = AccessLinkResponse),
        (status = 404, description = "Lease not found")
    )
)]
pub async fn issue_access_link(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
) -> GatewayResult<Json<AccessLinkResponse>> {
    let ctx = team_context(&state, auth, &headers).await?;
    require_rental_manager(&ctx)?;

    let lease = resolve_lease(&state, ctx.team.id, &public_id).await?;

    let generated = state
        .magic_link
        .generate_token(lease.id, access_context(&headers))
        .await?;

    let link = state
        .config
        .http
        .public_base_url
        .as_ref()
        .map(|base| format!("{}/locataire/acces?token={}", base, generated.token));

    if let (Some(email), Some(link)) = (lease.tenant_email.as_deref(), link.as_deref()) {
        let content = keur_notify::magic_link(&lease.tenant_name, link);
        state.mailer.send(email, &content).await;
    }

    Ok(Json(AccessLinkResponse {
        token: generated.token,
        expires_at: generated.expires_at,
        link,
    }))
}

#[utoipa::path(
    get,
    path = "/api/rentals/transactions",
    tag = "rentals",
    responses(
        (status = 200, description = "Rent transactions for the team", body = [TransactionResponse])
    )
)]
pub async fn list_transactions(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<TransactionResponse>>> {
    let ctx = team_context(&state, auth, &headers).await?;

    let transactions = state.read_service.transactions(ctx.team.id).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/rentals/transactions/{id}/pay",
    tag = "rentals",
    params(("id" = i64, Path, description = "Transaction id")),
    request_body = RecordPaymentBody,
    responses(
        (status = 200, description = "Payment recorded", body = TransactionResponse),
        (status = 409, description = "Transaction already settled")
    )
)]
pub async fn record_payment(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RecordPaymentBody>,
) -> GatewayResult<Json<TransactionResponse>> {
    let ctx = team_context(&state, auth, &headers).await?;
    require_rental_manager(&ctx)?;

    let details = keur_database::PaymentDetails {
        amount_paid: body.amount_paid,
        payment_method: body.payment_method,
        payment_ref: body.payment_ref,
    };

    let transaction = state
        .payment_service
        .record_payment(ctx.team.id, id, &details)
        .await?;
    Ok(Json(transaction.into()))
}

#[utoipa::path(
    get,
    path = "/api/rentals/stats",
    tag = "rentals",
    responses(
        (status = 200, description = "Dashboard headline numbers")
    )
)]
pub async fn rental_stats(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<keur_database::RentalStats>> {
    let ctx = team_context(&state, auth, &headers).await?;
    Ok(Json(state.read_service.stats(ctx.team.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/rentals/late-payments",
    tag = "rentals",
    responses(
        (status = 200, description = "Rent periods past their due date")
    )
)]
pub async fn late_payments(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<keur_database::LatePayment>>> {
    let ctx = team_context(&state, auth, &headers).await?;
    Ok(Json(state.read_service.late_payments(ctx.team.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/rentals/advanced-stats",
    tag = "rentals",
    responses(
        (status = 200, description = "Occupancy, delay and revenue KPIs")
    )
)]
pub async fn advanced_stats(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<keur_database::AdvancedStats>> {
    let ctx = team_context(&state, auth, &headers).await?;
    Ok(Json(state.read_service.advanced_stats(ctx.team.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/rentals/revenue-history",
    tag = "rentals",
    params(("months" = Option<i64>, Query, description = "Window: 6, 12 or 24 months")),
    responses(
        (status = 200, description = "Expected and collected revenue per month"),
        (status = 400, description = "Unsupported window")
    )
)]
pub async fn revenue_history(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Query(query): Query<RevenueHistoryQuery>,
) -> GatewayResult<Json<Vec<keur_database::RevenueMonth>>> {
    let ctx = team_context(&state, auth, &headers).await?;

    let months = query.months.unwrap_or(12);
    let history = state
        .read_service
        .revenue_history(ctx.team.id, months)
        .await?;
    Ok(Json(history))
}

//! Contact lead endpoints.
//!
//! Submission is public, coming from listing pages; the pipeline views are
//! owner-only.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use keur_database::{CreateLeadRequest, Lead, LeadStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{require_rental_manager, team_context, AuthContext};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Lead> for LeadResponse {
    fn from(lead: Lead) -> Self {
        Self {
            id: lead.public_id,
            name: lead.name,
            phone: lead.phone,
            email: lead.email,
            message: lead.message,
            status: lead.status.to_string(),
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadBody {
    pub team_id: String,
    pub property_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeadStatusBody {
    pub status: String,
}

pub fn create_public_lead_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/leads", post(submit_lead))
}

pub fn create_lead_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/leads", get(list_leads))
        .route("/api/leads/:public_id/status", post(update_lead_status))
}

#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "leads",
    request_body = CreateLeadBody,
    responses(
        (status = 201, description = "Lead recorded", body = LeadResponse),
        (status = 404, description = "Team or property not found")
    )
)]
pub async fn submit_lead(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<CreateLeadBody>,
) -> GatewayResult<(StatusCode, Json<LeadResponse>)> {
    let team = state
        .teams
        .find_by_public_id(&body.team_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Team not found".to_string()))?;

    let property_id = match body.property_id.as_deref() {
        Some(public_id) => {
            let property = state
                .properties
                .find_by_public_id(public_id)
                .await?
                .ok_or_else(|| GatewayError::NotFound("Property not found".to_string()))?;
            Some(property.id)
        }
        None => None,
    };

    let request = CreateLeadRequest {
        property_id,
        name: body.name,
        phone: body.phone,
        email: body.email,
        message: body.message,
    };

    let lead = state.leads.create(team.id, &request).await?;
    Ok((StatusCode::CREATED, Json(lead.into())))
}

#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "leads",
    responses(
        (status = 200, description = "Leads for the team", body = [LeadResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_leads(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<LeadResponse>>> {
    let ctx = team_context(&state, auth, &headers).await?;

    let leads = state.leads.find_by_team(ctx.team.id).await?;
    Ok(Json(leads.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/leads/{public_id}/status",
    tag = "leads",
    params(("public_id" = String, Path, description = "Lead public id")),
    request_body = UpdateLeadStatusBody,
    responses(
        (status = 200, description = "Status advanced", body = LeadResponse),
        (status = 409, description = "Leads only move forward")
    )
)]
pub async fn update_lead_status(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Path(public_id): Path<String>,
    Json(body): Json<UpdateLeadStatusBody>,
) -> GatewayResult<Json<LeadResponse>> {
    let ctx = team_context(&state, auth, &headers).await?;
    require_rental_manager(&ctx)?;

    let next = match body.status.as_str() {
        "contacte" => LeadStatus::Contacted,
        "clos" => LeadStatus::Closed,
        other => {
            return Err(GatewayError::InvalidRequest(format!(
                "unknown lead status: {other}"
            )))
        }
    };

    let lead = state
        .leads
        .update_status(ctx.team.id, &public_id, next)
        .await?;
    Ok(Json(lead.into()))
}

//! Middleware for authentication and other cross-cutting concerns

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use keur_database::{Team, TeamRole};
use keur_tenants::AccessContext;
use std::sync::Arc;
use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Who the bearer token belongs to. Owner accounts carry a user id, tenant
/// portal sessions carry the lease they unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthContext {
    User { user_id: i64 },
    Tenant { lease_id: i64 },
}

/// The acting user's team and role, resolved once per request.
#[derive(Debug, Clone)]
pub struct TeamContext {
    pub user_id: i64,
    pub team: Team,
    pub role: TeamRole,
}

/// Authentication middleware that validates bearer session tokens.
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = bearer_token(request.headers()).ok_or_else(|| {
        GatewayError::AuthenticationFailed("Missing bearer token".to_string())
    })?;

    let session = state.users.find_valid_session(&token).await?;

    let context = match (session.user_id, session.lease_id) {
        (Some(user_id), _) => AuthContext::User { user_id },
        (None, Some(lease_id)) => AuthContext::Tenant { lease_id },
        (None, None) => {
            return Err(GatewayError::AuthenticationFailed(
                "Session has no principal".to_string(),
            ))
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the team the request acts on. The `x-team` header selects among
/// the user's teams by public id; without it the first membership wins.
pub async fn team_context(
    state: &GatewayState,
    auth: AuthContext,
    headers: &HeaderMap,
) -> GatewayResult<TeamContext> {
    let AuthContext::User { user_id } = auth else {
        return Err(GatewayError::AuthorizationFailed(
            "Owner account required".to_string(),
        ));
    };

    let team = match headers.get("x-team").and_then(|v| v.to_str().ok()) {
        Some(public_id) => state
            .teams
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Team not found".to_string()))?,
        None => state
            .teams
            .find_teams_for_user(user_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GatewayError::AuthorizationFailed("No team membership".to_string())
            })?,
    };

    let membership = state
        .teams
        .find_membership(team.id, user_id)
        .await?
        .ok_or_else(|| {
            GatewayError::AuthorizationFailed("Not a member of this team".to_string())
        })?;

    Ok(TeamContext {
        user_id,
        team,
        role: membership.role,
    })
}

pub fn require_rental_manager(ctx: &TeamContext) -> GatewayResult<()> {
    if !ctx.role.can_manage_rentals() {
        return Err(GatewayError::AuthorizationFailed(
            "Role cannot manage rentals".to_string(),
        ));
    }
    Ok(())
}

pub fn extract_user_id(auth: AuthContext) -> GatewayResult<i64> {
    match auth {
        AuthContext::User { user_id } => Ok(user_id),
        AuthContext::Tenant { .. } => Err(GatewayError::AuthorizationFailed(
            "Owner account required".to_string(),
        )),
    }
}

pub fn extract_lease_id(auth: AuthContext) -> GatewayResult<i64> {
    match auth {
        AuthContext::Tenant { lease_id } => Ok(lease_id),
        AuthContext::User { .. } => Err(GatewayError::AuthorizationFailed(
            "Tenant session required".to_string(),
        )),
    }
}

/// Build the audit context recorded with tenant access attempts.
pub fn access_context(headers: &HeaderMap) -> AccessContext<'_> {
    AccessContext {
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
    }
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

//! Account and session endpoints.
//!
//! There is no password flow: registration issues the bearer session
//! directly, external identity providers sit in front in production.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{bearer_token, extract_user_id, AuthContext};
use crate::state::GatewayState;

const USER_SESSION_TTL_DAYS: i64 = 30;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub team_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
    pub team_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<keur_database::User> for UserResponse {
    fn from(user: keur_database::User) -> Self {
        Self {
            id: user.public_id,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    pub teams: Vec<TeamResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub subscription_status: String,
    pub subscription_tier: Option<String>,
}

impl From<keur_database::Team> for TeamResponse {
    fn from(team: keur_database::Team) -> Self {
        Self {
            id: team.public_id,
            name: team.name,
            subscription_status: team.subscription_status.to_string(),
            subscription_tier: team.subscription_tier.map(|tier| tier.to_string()),
        }
    }
}

pub fn create_public_auth_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/auth/register", post(register))
}

pub fn create_auth_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<RegisterRequest>,
) -> GatewayResult<(StatusCode, Json<RegisterResponse>)> {
    if payload.email.trim().is_empty() || payload.team_name.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "email and team_name are required".to_string(),
        ));
    }

    let user = state
        .users
        .create(payload.email.trim(), payload.display_name.as_deref())
        .await?;
    let team = state.teams.create(payload.team_name.trim(), user.id).await?;
    let session = state
        .users
        .create_user_session(user.id, USER_SESSION_TTL_DAYS)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token: session.token,
            expires_at: session.expires_at,
            user: user.into(),
            team_id: team.public_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
) -> GatewayResult<Json<MeResponse>> {
    let user_id = extract_user_id(auth)?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("User not found".to_string()))?;
    let teams = state.teams.find_teams_for_user(user_id).await?;

    Ok(Json(MeResponse {
        user: user.into(),
        teams: teams.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> GatewayResult<StatusCode> {
    let token = bearer_token(&headers).ok_or_else(|| {
        GatewayError::AuthenticationFailed("Missing bearer token".to_string())
    })?;

    state.users.delete_session(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

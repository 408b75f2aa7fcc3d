//! Marketplace listing endpoints.
//!
//! Browsing and reviews are public; publishing and the team inventory view
//! require an owner session.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use keur_cache::keys::{property_reviews_key, TTL_PROPERTY_REVIEWS};
use keur_database::{CreatePropertyRequest, CreateReviewRequest, Property, Review};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::{team_context, AuthContext};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub city: Option<String>,
    pub address: Option<String>,
    pub images: Vec<String>,
    pub validation_status: String,
    pub created_at: String,
}

impl From<Property> for PropertyResponse {
    fn from(property: Property) -> Self {
        Self {
            id: property.public_id,
            title: property.title,
            description: property.description,
            price: property.price,
            city: property.city,
            address: property.address,
            images: property.images,
            validation_status: property.validation_status.to_string(),
            created_at: property.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: i64,
    pub author_name: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            author_name: review.author_name,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyBody {
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub city: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewBody {
    pub author_name: String,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub city: Option<String>,
}

pub fn create_public_listing_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/properties", get(browse))
        .route(
            "/api/properties/:public_id/reviews",
            get(list_reviews).post(post_review),
        )
}

pub fn create_listing_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/properties", post(publish))
        .route("/api/teams/properties", get(team_properties))
}

#[utoipa::path(
    get,
    path = "/api/properties",
    tag = "listings",
    params(("city" = Option<String>, Query, description = "Filter by city")),
    responses(
        (status = 200, description = "Verified listings", body = [PropertyResponse])
    )
)]
pub async fn browse(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<BrowseQuery>,
) -> GatewayResult<Json<Vec<PropertyResponse>>> {
    let properties = state
        .properties
        .find_verified(query.city.as_deref())
        .await?;
    Ok(Json(properties.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/properties",
    tag = "listings",
    request_body = CreatePropertyBody,
    responses(
        (status = 201, description = "Listing created, awaiting validation", body = PropertyResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn publish(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Json(body): Json<CreatePropertyBody>,
) -> GatewayResult<(StatusCode, Json<PropertyResponse>)> {
    let ctx = team_context(&state, auth, &headers).await?;

    let request = CreatePropertyRequest {
        title: body.title,
        description: body.description,
        price: body.price,
        city: body.city,
        address: body.address,
        images: body.images,
    };

    let property = state
        .properties
        .create(ctx.team.id, ctx.user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(property.into())))
}

#[utoipa::path(
    get,
    path = "/api/teams/properties",
    tag = "listings",
    responses(
        (status = 200, description = "All listings for the team", body = [PropertyResponse])
    )
)]
pub async fn team_properties(
    State(state): State<Arc<GatewayState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<PropertyResponse>>> {
    let ctx = team_context(&state, auth, &headers).await?;

    let properties = state.properties.find_by_team(ctx.team.id).await?;
    Ok(Json(properties.into_iter().map(Into::into).collect()))
}

async fn resolve_property(state: &GatewayState, public_id: &str) -> GatewayResult<Property> {
    state
        .properties
        .find_by_public_id(public_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Property not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/properties/{public_id}/reviews",
    tag = "listings",
    params(("public_id" = String, Path, description = "Property public id")),
    responses(
        (status = 200, description = "Reviews for the listing", body = [ReviewResponse]),
        (status = 404, description = "Property not found")
    )
)]
pub async fn list_reviews(
    State(state): State<Arc<GatewayState>>,
    Path(public_id): Path<String>,
) -> GatewayResult<Json<Vec<ReviewResponse>>> {
    let property = resolve_property(&state, &public_id).await?;

    let reviews: Vec<Review> = state
        .cache
        .get_or_set(
            &property_reviews_key(property.id),
            TTL_PROPERTY_REVIEWS,
            || state.properties.find_reviews(property.id),
        )
        .await?;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/properties/{public_id}/reviews",
    tag = "listings",
    params(("public_id" = String, Path, description = "Property public id")),
    request_body = CreateReviewBody,
    responses(
        (status = 201, description = "Review posted", body = ReviewResponse),
        (status = 400, description = "Rating out of range")
    )
)]
pub async fn post_review(
    State(state): State<Arc<GatewayState>>,
    Path(public_id): Path<String>,
    Json(body): Json<CreateReviewBody>,
) -> GatewayResult<(StatusCode, Json<ReviewResponse>)> {
    let property = resolve_property(&state, &public_id).await?;

    let request = CreateReviewRequest {
        author_name: body.author_name,
        rating: body.rating,
        comment: body.comment,
    };

    let review = state.properties.create_review(property.id, &request).await?;
    state
        .cache
        .invalidate(&[property_reviews_key(property.id)])
        .await;

    Ok((StatusCode::CREATED, Json(review.into())))
}

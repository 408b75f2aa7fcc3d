//! REST API route modules

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

pub mod admin;
pub mod auth;
pub mod health;
pub mod leads;
pub mod listings;
pub mod rentals;
pub mod tenant;
pub mod webhooks;

/// Assemble all REST routes. Session-protected routes carry the auth
/// middleware; the rest verify the caller themselves or are public.
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let public = Router::new()
        .merge(health::create_health_routes())
        .merge(auth::create_public_auth_routes())
        .merge(tenant::create_public_tenant_routes())
        .merge(listings::create_public_listing_routes())
        .merge(leads::create_public_lead_routes())
        .merge(webhooks::create_webhook_routes())
        .merge(admin::create_admin_routes());

    let protected = Router::new()
        .merge(auth::create_auth_routes())
        .merge(rentals::create_rental_routes())
        .merge(tenant::create_tenant_routes())
        .merge(listings::create_listing_routes())
        .merge(leads::create_lead_routes())
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

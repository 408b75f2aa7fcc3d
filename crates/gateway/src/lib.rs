//! # Keurimmo Gateway Crate
//!
//! HTTP layer for the Keurimmo backend: REST routes, authentication
//! middleware and webhook endpoints, dispatching to the rental, tenant,
//! listing and billing services.

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, AuthContext};
pub use state::GatewayState;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    let mut router = Router::new()
        .merge(rest::create_rest_routes(arc_state.clone()).with_state(arc_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::PATCH,
                ])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    // Swagger UI in debug builds only
    #[cfg(debug_assertions)]
    {
        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health,
                rest::auth::register,
                rest::auth::me,
                rest::auth::logout,
                rest::rentals::list_leases,
                rest::rentals::create_lease,
                rest::rentals::lease_detail,
                rest::rentals::terminate_lease,
                rest::rentals::list_messages,
                rest::rentals::post_message,
                rest::rentals::mark_messages_read,
                rest::rentals::issue_access_link,
                rest::rentals::list_transactions,
                rest::rentals::record_payment,
                rest::rentals::rental_stats,
                rest::rentals::late_payments,
                rest::rentals::advanced_stats,
                rest::rentals::revenue_history,
                rest::tenant::validate,
                rest::tenant::verify,
                rest::tenant::resume,
                rest::tenant::dashboard,
                rest::tenant::payments,
                rest::tenant::list_messages,
                rest::tenant::post_message,
                rest::tenant::mark_messages_read,
                rest::listings::browse,
                rest::listings::publish,
                rest::listings::team_properties,
                rest::listings::list_reviews,
                rest::listings::post_review,
                rest::leads::submit_lead,
                rest::leads::list_leads,
                rest::leads::update_lead_status,
                rest::webhooks::stripe_webhook,
                rest::webhooks::paydunya_webhook,
                rest::admin::catch_up_documents,
                rest::admin::generate_monthly_rentals,
                rest::admin::validate_property,
                rest::admin::cache_metrics,
            ),
            components(
                schemas(
                    rest::auth::RegisterRequest,
                    rest::auth::RegisterResponse,
                    rest::auth::UserResponse,
                    rest::auth::MeResponse,
                    rest::auth::TeamResponse,
                    rest::rentals::LeaseResponse,
                    rest::rentals::TransactionResponse,
                    rest::rentals::MessageResponse,
                    rest::rentals::CreateLeaseBody,
                    rest::rentals::PostMessageBody,
                    rest::rentals::RecordPaymentBody,
                    rest::rentals::AccessLinkResponse,
                    rest::tenant::TokenBody,
                    rest::tenant::VerifyBody,
                    rest::tenant::ValidateResponse,
                    rest::tenant::SessionResponse,
                    rest::tenant::TenantMessageBody,
                    rest::listings::PropertyResponse,
                    rest::listings::ReviewResponse,
                    rest::listings::CreatePropertyBody,
                    rest::listings::CreateReviewBody,
                    rest::leads::LeadResponse,
                    rest::leads::CreateLeadBody,
                    rest::leads::UpdateLeadStatusBody,
                    rest::admin::ValidatePropertyBody,
                )
            ),
            tags(
                (name = "health", description = "Service health"),
                (name = "auth", description = "Accounts and sessions"),
                (name = "rentals", description = "Lease and rent management"),
                (name = "tenant", description = "Tenant portal"),
                (name = "listings", description = "Marketplace listings"),
                (name = "leads", description = "Contact leads"),
                (name = "webhooks", description = "Payment provider webhooks"),
                (name = "admin", description = "Jobs and moderation"),
            )
        )]
        struct ApiDoc;

        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    router
}

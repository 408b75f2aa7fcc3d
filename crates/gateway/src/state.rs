//! Shared application state for the gateway

use keur_cache::CacheClient;
use keur_config::AppConfig;
use keur_database::{
    LeadRepository, LeaseRepository, PropertyRepository, TeamRepository, UserRepository,
};
use keur_notify::Mailer;
use keur_rentals::{
    DocumentService, GenerationService, LeaseService, PaymentService, RentalReadService,
    TenantPortalService,
};
use keur_tenants::MagicLinkService;
use sqlx::SqlitePool;

/// Shared application state containing the services and repositories the
/// handlers dispatch to.
pub struct GatewayState {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub cache: CacheClient,
    pub mailer: Mailer,

    pub lease_service: LeaseService,
    pub read_service: RentalReadService,
    pub payment_service: PaymentService,
    pub generation_service: GenerationService,
    pub document_service: DocumentService,
    pub tenant_portal: TenantPortalService,
    pub magic_link: MagicLinkService,

    pub users: UserRepository,
    pub teams: TeamRepository,
    pub properties: PropertyRepository,
    pub leads: LeadRepository,
    pub leases: LeaseRepository,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, cache: CacheClient, mailer: Mailer, config: AppConfig) -> Self {
        Self {
            lease_service: LeaseService::new(pool.clone(), cache.clone()),
            read_service: RentalReadService::new(pool.clone(), cache.clone()),
            payment_service: PaymentService::new(pool.clone(), cache.clone(), mailer.clone()),
            generation_service: GenerationService::new(pool.clone(), cache.clone()),
            document_service: DocumentService::new(pool.clone()),
            tenant_portal: TenantPortalService::new(pool.clone(), cache.clone()),
            magic_link: MagicLinkService::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            teams: TeamRepository::new(pool.clone()),
            properties: PropertyRepository::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            leases: LeaseRepository::new(pool.clone()),
            pool,
            config,
            cache,
            mailer,
        }
    }
}

//! Keurimmo Rentals Crate
//!
//! The rental domain: lease lifecycle, cached dashboard reads, rent
//! settlement, monthly schedule generation, document backfill and the
//! tenant portal read models.

pub mod documents;
pub mod generation;
pub mod leases;
pub mod payments;
pub mod read_models;
pub mod tenant_portal;

pub use documents::{CatchUpReport, DocumentService};
pub use generation::{GenerationReport, GenerationService};
pub use leases::LeaseService;
pub use payments::PaymentService;
pub use read_models::RentalReadService;
pub use tenant_portal::{TenantDashboard, TenantPortalService};

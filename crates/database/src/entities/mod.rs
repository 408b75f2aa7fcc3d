//! Entity definitions for the rental platform

pub mod access_log;
pub mod document;
pub mod lead;
pub mod lease;
pub mod message;
pub mod property;
pub mod stats;
pub mod team;
pub mod transaction;
pub mod user;

pub use access_log::{AccessAction, TenantAccessLog};
pub use document::{CreateDocumentRequest, DocumentType, UserDocument};
pub use lead::{CreateLeadRequest, Lead, LeadStatus};
pub use lease::{CreateLeaseRequest, Lease, LeaseStatus};
pub use message::{LeaseMessage, MessageSender};
pub use property::{
    CreatePropertyRequest, CreateReviewRequest, ListingPayment, Property, Review, ValidationStatus,
};
pub use stats::{AdvancedStats, LatePayment, RentalStats, RevenueMonth};
pub use team::{
    BillingCycle, SubscriptionStatus, SubscriptionTier, SubscriptionUpdate, Team, TeamMember,
    TeamRole,
};
pub use transaction::{PaymentDetails, RentalTransaction, TransactionStatus};
pub use user::{Session, User};

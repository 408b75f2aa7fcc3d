//! Database repository implementations

pub mod access_log_repository;
pub mod document_repository;
pub mod lead_repository;
pub mod lease_repository;
pub mod message_repository;
pub mod property_repository;
pub mod team_repository;
pub mod transaction_repository;
pub mod user_repository;

// Re-export all repositories for convenience
pub use access_log_repository::*;
pub use document_repository::*;
pub use lead_repository::*;
pub use lease_repository::*;
pub use message_repository::*;
pub use property_repository::*;
pub use team_repository::*;
pub use transaction_repository::*;
pub use user_repository::*;

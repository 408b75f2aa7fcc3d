//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Database query error: {0}")]
    QueryError(String),
}

/// Errors for leases, rental transactions and lease messages
#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Lease not found")]
    LeaseNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Transaction already settled")]
    AlreadySettled,

    #[error("Lease is terminated")]
    LeaseTerminated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors for teams, members, users and sessions
#[derive(Debug, Error)]
pub enum TeamError {
    #[error("Team not found")]
    TeamNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors for properties, reviews and leads
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Property not found")]
    PropertyNotFound,

    #[error("Lead not found")]
    LeadNotFound,

    #[error("Invalid status transition")]
    InvalidTransition,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors for generated/uploaded document records
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not found")]
    DocumentNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors for the tenant magic-link access path
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Token not found")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Lease is not active")]
    LeaseInactive,

    #[error("Identity verification failed")]
    IdentityMismatch,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

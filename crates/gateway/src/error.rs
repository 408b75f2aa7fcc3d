//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keur_database::{AccessError, DocumentError, ListingError, RentalError, TeamError};
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::InternalError(_) | GatewayError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<RentalError> for GatewayError {
    fn from(error: RentalError) -> Self {
        match error {
            RentalError::LeaseNotFound => GatewayError::NotFound("Lease not found".to_string()),
            RentalError::TransactionNotFound => {
                GatewayError::NotFound("Transaction not found".to_string())
            }
            RentalError::AlreadySettled => {
                GatewayError::Conflict("Transaction already settled".to_string())
            }
            RentalError::LeaseTerminated => {
                GatewayError::Conflict("Lease is terminated".to_string())
            }
            RentalError::InvalidInput(msg) => GatewayError::InvalidRequest(msg),
            RentalError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
        }
    }
}

impl From<TeamError> for GatewayError {
    fn from(error: TeamError) -> Self {
        match error {
            TeamError::TeamNotFound => GatewayError::NotFound("Team not found".to_string()),
            TeamError::UserNotFound => GatewayError::NotFound("User not found".to_string()),
            TeamError::MemberNotFound => GatewayError::NotFound("Member not found".to_string()),
            TeamError::EmailAlreadyExists => {
                GatewayError::Conflict("Email already registered".to_string())
            }
            TeamError::SessionExpired => {
                GatewayError::AuthenticationFailed("Session expired".to_string())
            }
            TeamError::InvalidSession => {
                GatewayError::AuthenticationFailed("Invalid session".to_string())
            }
            TeamError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
        }
    }
}

impl From<ListingError> for GatewayError {
    fn from(error: ListingError) -> Self {
        match error {
            ListingError::PropertyNotFound => {
                GatewayError::NotFound("Property not found".to_string())
            }
            ListingError::LeadNotFound => GatewayError::NotFound("Lead not found".to_string()),
            ListingError::InvalidTransition => {
                GatewayError::Conflict("Invalid status transition".to_string())
            }
            ListingError::InvalidInput(msg) => GatewayError::InvalidRequest(msg),
            ListingError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
        }
    }
}

impl From<DocumentError> for GatewayError {
    fn from(error: DocumentError) -> Self {
        match error {
            DocumentError::DocumentNotFound => {
                GatewayError::NotFound("Document not found".to_string())
            }
            DocumentError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
        }
    }
}

impl From<AccessError> for GatewayError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::DatabaseError(msg) => GatewayError::DatabaseError(msg),
            // Token problems all read the same to the tenant.
            other => GatewayError::AuthenticationFailed(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        GatewayError::DatabaseError(error.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        GatewayError::InvalidRequest(format!("JSON serialization error: {}", error))
    }
}

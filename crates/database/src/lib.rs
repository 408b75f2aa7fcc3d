//! Keurimmo Database Crate
//!
//! Connection management, migrations and repository implementations for the
//! rental-management backend. Every tenant-facing table is scoped by team_id
//! and repositories take the team explicitly.

use sqlx::SqlitePool;

use keur_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

// Re-export repositories
pub use repos::{
    AccessLogRepository, DocumentRepository, LeadRepository, LeaseRepository, LeaseTokenMatch,
    MessageRepository, PropertyRepository, TeamRepository, TransactionRepository, UserRepository,
};

// Re-export entities
pub use entities::{
    access_log::{AccessAction, TenantAccessLog},
    document::{CreateDocumentRequest, DocumentType, UserDocument},
    lead::{CreateLeadRequest, Lead, LeadStatus},
    lease::{CreateLeaseRequest, Lease, LeaseStatus},
    message::{LeaseMessage, MessageSender},
    property::{
        CreatePropertyRequest, CreateReviewRequest, ListingPayment, Property, Review,
        ValidationStatus,
    },
    stats::{AdvancedStats, LatePayment, RentalStats, RevenueMonth},
    team::{
        BillingCycle, SubscriptionStatus, SubscriptionTier, SubscriptionUpdate, Team, TeamMember,
        TeamRole,
    },
    transaction::{PaymentDetails, RentalTransaction, TransactionStatus},
    user::{Session, User},
};

// Re-export types
pub use types::{
    errors::{AccessError, DatabaseError, DocumentError, ListingError, RentalError, TeamError},
    AccessResult, DatabaseResult, DocumentResult, ListingResult, RentalResult, TeamResult,
};

/// Re-export commonly used types for convenience
pub use sqlx::Pool;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite://{}", db_path.display());

        let config = DatabaseConfig {
            url: db_url,
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let (_pool, _temp_dir) = create_test_database().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp_dir) = create_test_database().await;

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(result.0);
    }
}

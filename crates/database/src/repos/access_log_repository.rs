//! Repository for the tenant access audit trail.

use crate::entities::{AccessAction, TenantAccessLog};
use crate::types::{AccessError, AccessResult};
use sqlx::{Row, SqlitePool};

/// Repository for tenant access log database operations
pub struct AccessLogRepository {
    pool: SqlitePool,
}

impl AccessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an audit entry
    pub async fn record(
        &self,
        lease_id: Option<i64>,
        action: AccessAction,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        failure_reason: Option<&str>,
    ) -> AccessResult<()> {
        sqlx::query(
            "INSERT INTO tenant_access_logs (lease_id, action, ip_address, user_agent, \
             failure_reason, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(lease_id)
        .bind(action.to_string())
        .bind(ip_address)
        .bind(user_agent)
        .bind(failure_reason)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Failed identity checks on a lease since its current token was issued.
    /// Counts zero when no token has ever been generated.
    pub async fn failed_attempts_since_token(&self, lease_id: i64) -> AccessResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM tenant_access_logs \
             WHERE lease_id = ? AND action = 'identity_verification_failed' \
             AND created_at > COALESCE(( \
                 SELECT MAX(created_at) FROM tenant_access_logs \
                 WHERE lease_id = ? AND action = 'token_generated'), '')",
        )
        .bind(lease_id)
        .bind(lease_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        row.try_get("count")
            .map_err(|e| AccessError::DatabaseError(e.to_string()))
    }

    /// Recent audit entries for a lease, newest first
    pub async fn find_recent(
        &self,
        lease_id: i64,
        limit: i64,
    ) -> AccessResult<Vec<TenantAccessLog>> {
        let rows = sqlx::query(
            "SELECT id, lease_id, action, ip_address, user_agent, failure_reason, created_at \
             FROM tenant_access_logs WHERE lease_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(lease_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let action_str: String = row
                    .try_get("action")
                    .map_err(|e| AccessError::DatabaseError(e.to_string()))?;
                Ok(TenantAccessLog {
                    id: row
                        .try_get("id")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                    lease_id: row
                        .try_get("lease_id")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                    action: AccessAction::from(action_str.as_str()),
                    ip_address: row
                        .try_get("ip_address")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                    user_agent: row
                        .try_get("user_agent")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                    failure_reason: row
                        .try_get("failure_reason")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| AccessError::DatabaseError(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::MIGRATOR;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (public_id, email, created_at) VALUES ('u_test', 'owner@test.sn', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO teams (public_id, name, created_by, created_at) VALUES ('t_test', 'Agence Test', 1, ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO leases (public_id, team_id, owner_id, tenant_name, monthly_amount, \
             billing_day, start_date, status, created_at) \
             VALUES ('l_test', 1, 1, 'Awa Diop', 250000, 5, '2025-01-01', 'active', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    async fn insert_log(pool: &SqlitePool, action: &str, created_at: &str) {
        sqlx::query(
            "INSERT INTO tenant_access_logs (lease_id, action, created_at) VALUES (1, ?, ?)",
        )
        .bind(action)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_attempts_reset_on_new_token() {
        let pool = create_test_pool().await;
        let repo = AccessLogRepository::new(pool.clone());

        insert_log(&pool, "token_generated", "2025-01-01T00:00:00+00:00").await;
        insert_log(&pool, "identity_verification_failed", "2025-01-01T01:00:00+00:00").await;
        insert_log(&pool, "identity_verification_failed", "2025-01-01T02:00:00+00:00").await;
        assert_eq!(repo.failed_attempts_since_token(1).await.unwrap(), 2);

        // A fresh token resets the window.
        insert_log(&pool, "token_generated", "2025-01-02T00:00:00+00:00").await;
        assert_eq!(repo.failed_attempts_since_token(1).await.unwrap(), 0);

        insert_log(&pool, "identity_verification_failed", "2025-01-02T01:00:00+00:00").await;
        assert_eq!(repo.failed_attempts_since_token(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let pool = create_test_pool().await;
        let repo = AccessLogRepository::new(pool);

        repo.record(
            Some(1),
            AccessAction::TokenValidated,
            Some("41.82.0.1"),
            Some("Mozilla/5.0"),
            None,
        )
        .await
        .unwrap();
        repo.record(
            Some(1),
            AccessAction::IdentityVerificationFailed,
            None,
            None,
            Some("last name mismatch"),
        )
        .await
        .unwrap();

        let entries = repo.find_recent(1, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AccessAction::IdentityVerificationFailed);
        assert_eq!(entries[0].failure_reason.as_deref(), Some("last name mismatch"));
        assert_eq!(entries[1].action, AccessAction::TokenValidated);
    }
}

//! Repository for lease message data access operations.

use crate::entities::{LeaseMessage, MessageSender};
use crate::types::{RentalError, RentalResult};
use sqlx::{Row, SqlitePool};

/// Repository for lease message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message to a lease thread
    pub async fn create(
        &self,
        lease_id: i64,
        team_id: i64,
        sender: MessageSender,
        body: &str,
    ) -> RentalResult<LeaseMessage> {
        if body.trim().is_empty() {
            return Err(RentalError::InvalidInput(
                "message body is required".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO lease_messages (lease_id, team_id, sender, body, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(lease_id)
        .bind(team_id)
        .bind(sender.to_string())
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        Ok(LeaseMessage {
            id: result.last_insert_rowid(),
            lease_id,
            team_id,
            sender,
            body: body.to_string(),
            read_at: None,
            created_at: now,
        })
    }

    /// Messages for a lease thread, oldest first
    pub async fn find_by_lease(&self, lease_id: i64) -> RentalResult<Vec<LeaseMessage>> {
        let rows = sqlx::query(
            "SELECT id, lease_id, team_id, sender, body, read_at, created_at \
             FROM lease_messages WHERE lease_id = ? ORDER BY created_at, id",
        )
        .bind(lease_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let sender_str: String = row
                    .try_get("sender")
                    .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
                Ok(LeaseMessage {
                    id: row
                        .try_get("id")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    lease_id: row
                        .try_get("lease_id")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    team_id: row
                        .try_get("team_id")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    sender: MessageSender::from(sender_str.as_str()),
                    body: row
                        .try_get("body")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    read_at: row
                        .try_get("read_at")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Mark everything the given side has not read yet
    pub async fn mark_read(&self, lease_id: i64, reader: MessageSender) -> RentalResult<u64> {
        // Reading marks the other side's messages.
        let sender = match reader {
            MessageSender::Owner => MessageSender::Tenant,
            MessageSender::Tenant => MessageSender::Owner,
        };

        let result = sqlx::query(
            "UPDATE lease_messages SET read_at = ? \
             WHERE lease_id = ? AND sender = ? AND read_at IS NULL",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(lease_id)
        .bind(sender.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
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

    #[tokio::test]
    async fn test_thread_ordering_and_read_marks() {
        let pool = create_test_pool().await;
        let repo = MessageRepository::new(pool);

        repo.create(1, 1, MessageSender::Owner, "Bonjour, le loyer est dû le 5.")
            .await
            .unwrap();
        repo.create(1, 1, MessageSender::Tenant, "Bien reçu, je paie demain.")
            .await
            .unwrap();

        let thread = repo.find_by_lease(1).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].sender, MessageSender::Owner);
        assert!(thread[1].read_at.is_none());

        // Owner reading marks the tenant's message only.
        let marked = repo.mark_read(1, MessageSender::Owner).await.unwrap();
        assert_eq!(marked, 1);

        let thread = repo.find_by_lease(1).await.unwrap();
        assert!(thread[0].read_at.is_none());
        assert!(thread[1].read_at.is_some());
    }

    #[tokio::test]
    async fn test_rejects_empty_body() {
        let pool = create_test_pool().await;
        let repo = MessageRepository::new(pool);

        assert!(matches!(
            repo.create(1, 1, MessageSender::Owner, "   ").await,
            Err(RentalError::InvalidInput(_))
        ));
    }
}

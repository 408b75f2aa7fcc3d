//! Repository for generated document data access operations.
//!
//! Also exposes the gap queries the catch-up job relies on: leases without a
//! stored contract and paid periods without a stored receipt.

use crate::entities::{CreateDocumentRequest, DocumentType, UserDocument};
use crate::types::{DocumentError, DocumentResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const DOCUMENT_COLUMNS: &str = "id, public_id, team_id, user_id, lease_id, transaction_id, \
     file_type, category, title, body, created_at";

/// Repository for user document database operations
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a rendered document
    pub async fn create(
        &self,
        team_id: i64,
        request: &CreateDocumentRequest,
    ) -> DocumentResult<UserDocument> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO user_documents (public_id, team_id, user_id, lease_id, transaction_id, \
             file_type, category, title, body, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(team_id)
        .bind(request.user_id)
        .bind(request.lease_id)
        .bind(request.transaction_id)
        .bind(request.file_type.to_string())
        .bind(&request.category)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        let document_id = result.last_insert_rowid();

        info!(
            document_id = document_id,
            file_type = %request.file_type,
            lease_id = ?request.lease_id,
            "stored generated document"
        );

        Ok(UserDocument {
            id: document_id,
            public_id,
            team_id,
            user_id: request.user_id,
            lease_id: request.lease_id,
            transaction_id: request.transaction_id,
            file_type: request.file_type,
            category: request.category.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            created_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DocumentResult<Option<UserDocument>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM user_documents WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        row.map(map_document_row).transpose()
    }

    /// Documents attached to a lease, newest first
    pub async fn find_by_lease(&self, lease_id: i64) -> DocumentResult<Vec<UserDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM user_documents \
             WHERE lease_id = ? ORDER BY created_at DESC"
        ))
        .bind(lease_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_document_row).collect()
    }

    /// Whether a document of the given kind already exists for a lease
    pub async fn exists_for_lease(
        &self,
        lease_id: i64,
        file_type: DocumentType,
    ) -> DocumentResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM user_documents WHERE lease_id = ? AND file_type = ?",
        )
        .bind(lease_id)
        .bind(file_type.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;
        Ok(count > 0)
    }

    /// Active lease IDs that have no stored contract document
    pub async fn leases_missing_contract(&self) -> DocumentResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT l.id FROM leases l \
             WHERE l.status = 'active' AND NOT EXISTS ( \
                 SELECT 1 FROM user_documents d \
                 WHERE d.lease_id = l.id AND d.file_type = 'bail') \
             ORDER BY l.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get("id")
                    .map_err(|e| DocumentError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    /// Paid transaction IDs that have no stored receipt
    pub async fn transactions_missing_receipt(&self) -> DocumentResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT t.id FROM rental_transactions t \
             WHERE t.status = 'paid' AND NOT EXISTS ( \
                 SELECT 1 FROM user_documents d \
                 WHERE d.transaction_id = t.id AND d.file_type = 'quittance') \
             ORDER BY t.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                row.try_get("id")
                    .map_err(|e| DocumentError::DatabaseError(e.to_string()))
            })
            .collect()
    }
}

fn map_document_row(row: sqlx::sqlite::SqliteRow) -> DocumentResult<UserDocument> {
    let file_type_str: String = row
        .try_get("file_type")
        .map_err(|e| DocumentError::DatabaseError(e.to_string()))?;

    Ok(UserDocument {
        id: row
            .try_get("id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        team_id: row
            .try_get("team_id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        lease_id: row
            .try_get("lease_id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        transaction_id: row
            .try_get("transaction_id")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        file_type: DocumentType::from(file_type_str.as_str()),
        category: row
            .try_get("category")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        title: row
            .try_get("title")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        body: row
            .try_get("body")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| DocumentError::DatabaseError(e.to_string()))?,
    })
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
        sqlx::query(
            "INSERT INTO rental_transactions (lease_id, team_id, period_year, period_month, \
             status, amount_due, amount_paid, created_at) \
             VALUES (1, 1, 2025, 1, 'paid', 250000, 250000, ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn contract_request() -> CreateDocumentRequest {
        CreateDocumentRequest {
            user_id: 1,
            lease_id: Some(1),
            transaction_id: None,
            file_type: DocumentType::Lease,
            category: "rentals".to_string(),
            title: "Contrat de bail".to_string(),
            body: "<html>bail</html>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_gap_queries_drive_catch_up() {
        let pool = create_test_pool().await;
        let repo = DocumentRepository::new(pool);

        // Both gaps open at first.
        assert_eq!(repo.leases_missing_contract().await.unwrap(), vec![1]);
        assert_eq!(repo.transactions_missing_receipt().await.unwrap(), vec![1]);

        repo.create(1, &contract_request()).await.unwrap();
        assert!(repo.leases_missing_contract().await.unwrap().is_empty());

        let receipt = CreateDocumentRequest {
            user_id: 1,
            lease_id: Some(1),
            transaction_id: Some(1),
            file_type: DocumentType::Receipt,
            category: "rentals".to_string(),
            title: "Quittance janvier 2025".to_string(),
            body: "<html>quittance</html>".to_string(),
        };
        repo.create(1, &receipt).await.unwrap();
        assert!(repo.transactions_missing_receipt().await.unwrap().is_empty());

        let documents = repo.find_by_lease(1).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert!(repo.exists_for_lease(1, DocumentType::Lease).await.unwrap());
        assert!(repo.exists_for_lease(1, DocumentType::Receipt).await.unwrap());
    }
}

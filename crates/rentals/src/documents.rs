//! Lease contract and rent receipt document generation.
//!
//! Documents are rendered HTML bodies stored as `user_documents` rows.
//! The catch-up run backfills whatever is missing: active leases without a
//! contract and paid periods without a receipt. Per-item failures are
//! collected in the report instead of aborting the run.

use keur_database::{
    CreateDocumentRequest, DocumentRepository, DocumentResult, DocumentType, Lease,
    LeaseRepository, RentalTransaction, TransactionRepository,
};
use keur_notify::format_fcfa;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

pub const DOCUMENT_CATEGORY: &str = "rentals";

/// Outcome of a catch-up run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchUpReport {
    pub leases_processed: usize,
    pub leases_generated: usize,
    pub receipts_processed: usize,
    pub receipts_generated: usize,
    pub errors: Vec<String>,
}

pub struct DocumentService {
    documents: DocumentRepository,
    leases: LeaseRepository,
    transactions: TransactionRepository,
}

impl DocumentService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            documents: DocumentRepository::new(pool.clone()),
            leases: LeaseRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool),
        }
    }

    /// Backfill missing contracts and receipts across all teams.
    pub async fn catch_up(&self) -> DocumentResult<CatchUpReport> {
        let mut report = CatchUpReport::default();

        let lease_ids = self.documents.leases_missing_contract().await?;
        report.leases_processed = lease_ids.len();
        for lease_id in lease_ids {
            match self.generate_contract(lease_id).await {
                Ok(()) => report.leases_generated += 1,
                Err(e) => report.errors.push(format!("lease {lease_id}: {e}")),
            }
        }

        let transaction_ids = self.documents.transactions_missing_receipt().await?;
        report.receipts_processed = transaction_ids.len();
        for transaction_id in transaction_ids {
            match self.generate_receipt(transaction_id).await {
                Ok(()) => report.receipts_generated += 1,
                Err(e) => report
                    .errors
                    .push(format!("transaction {transaction_id}: {e}")),
            }
        }

        info!(
            contracts = report.leases_generated,
            receipts = report.receipts_generated,
            errors = report.errors.len(),
            "document catch-up finished"
        );

        Ok(report)
    }

    // Per-item errors become report strings, whatever layer they came from.
    async fn generate_contract(&self, lease_id: i64) -> Result<(), String> {
        let lease = self
            .leases
            .find_by_id_unscoped(lease_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "lease not found".to_string())?;

        self.documents
            .create(
                lease.team_id,
                &CreateDocumentRequest {
                    user_id: lease.owner_id,
                    lease_id: Some(lease.id),
                    transaction_id: None,
                    file_type: DocumentType::Lease,
                    category: DOCUMENT_CATEGORY.to_string(),
                    title: format!("Contrat de bail - {}", lease.tenant_name),
                    body: lease_contract_body(&lease),
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    async fn generate_receipt(&self, transaction_id: i64) -> Result<(), String> {
        let tx = self
            .transactions
            .find_by_id_unscoped(transaction_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "transaction not found".to_string())?;
        let lease = self
            .leases
            .find_by_id_unscoped(tx.lease_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "lease not found".to_string())?;

        self.documents
            .create(
                tx.team_id,
                &CreateDocumentRequest {
                    user_id: lease.owner_id,
                    lease_id: Some(lease.id),
                    transaction_id: Some(tx.id),
                    file_type: DocumentType::Receipt,
                    category: DOCUMENT_CATEGORY.to_string(),
                    title: format!(
                        "Quittance {}/{} - {}",
                        tx.period_month, tx.period_year, lease.tenant_name
                    ),
                    body: rent_receipt_body(&lease, &tx),
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

pub fn lease_contract_body(lease: &Lease) -> String {
    let address = lease.property_address.as_deref().unwrap_or("Adresse non renseignée");
    let amount = format_fcfa(lease.monthly_amount);

    format!(
        "<h1>Contrat de bail</h1>\
         <p>Locataire : <strong>{}</strong></p>\
         <p>Bien loué : {}</p>\
         <p>Loyer mensuel : <strong>{} FCFA</strong>, payable le {} de chaque mois.</p>\
         <p>Date d'effet : {}</p>",
        lease.tenant_name, address, amount, lease.billing_day, lease.start_date
    )
}

pub fn rent_receipt_body(lease: &Lease, tx: &RentalTransaction) -> String {
    let amount = format_fcfa(tx.amount_paid.unwrap_or(tx.amount_due));
    let paid_at = tx.paid_at.as_deref().unwrap_or("-");

    format!(
        "<h1>Quittance de loyer</h1>\
         <p>Période : <strong>{}/{}</strong></p>\
         <p>Locataire : {}</p>\
         <p>Montant réglé : <strong>{} FCFA</strong></p>\
         <p>Réglé le : {}</p>",
        tx.period_month, tx.period_year, lease.tenant_name, amount, paid_at
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use keur_database::{CreateLeaseRequest, PaymentDetails, MIGRATOR};
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

        pool
    }

    #[tokio::test]
    async fn test_catch_up_backfills_once() {
        let pool = create_test_pool().await;

        let lease = LeaseRepository::new(pool.clone())
            .create(
                1,
                1,
                &CreateLeaseRequest {
                    property_id: None,
                    tenant_name: "Awa Diop".to_string(),
                    tenant_phone: None,
                    tenant_email: None,
                    property_address: Some("Sacré-Cœur 3, Dakar".to_string()),
                    monthly_amount: 250_000,
                    billing_day: Some(5),
                    start_date: "2025-01-01".to_string(),
                    end_date: None,
                },
            )
            .await
            .unwrap();

        let transactions = TransactionRepository::new(pool.clone());
        transactions
            .create_for_period(lease.id, 1, 2025, 1, 250_000)
            .await
            .unwrap();
        transactions
            .settle_if_pending(
                1,
                &PaymentDetails {
                    amount_paid: 250_000,
                    payment_method: "cash".to_string(),
                    payment_ref: None,
                },
            )
            .await
            .unwrap();

        let service = DocumentService::new(pool.clone());

        let first = service.catch_up().await.unwrap();
        assert_eq!(first.leases_generated, 1);
        assert_eq!(first.receipts_generated, 1);
        assert!(first.errors.is_empty());

        let second = service.catch_up().await.unwrap();
        assert_eq!(second.leases_processed, 0);
        assert_eq!(second.receipts_processed, 0);

        let documents = DocumentRepository::new(pool)
            .find_by_lease(lease.id)
            .await
            .unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents
            .iter()
            .any(|d| d.title.starts_with("Quittance 1/2025")));
    }

    #[test]
    fn test_receipt_body_uses_paid_amount() {
        let lease = Lease {
            id: 1,
            public_id: "l_test".to_string(),
            team_id: 1,
            owner_id: 1,
            property_id: None,
            tenant_name: "Awa Diop".to_string(),
            tenant_phone: None,
            tenant_email: None,
            property_address: None,
            monthly_amount: 250_000,
            billing_day: 5,
            start_date: "2025-01-01".to_string(),
            end_date: None,
            status: keur_database::LeaseStatus::Active,
            token_verified: false,
            token_revoked: false,
            last_access_at: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let tx = RentalTransaction {
            id: 1,
            lease_id: 1,
            team_id: 1,
            period_month: 1,
            period_year: 2025,
            status: keur_database::TransactionStatus::Paid,
            amount_due: 250_000,
            amount_paid: Some(240_000),
            paid_at: Some("2025-01-06T10:00:00Z".to_string()),
            payment_method: Some("paydunya".to_string()),
            payment_ref: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let body = rent_receipt_body(&lease, &tx);
        assert!(body.contains("240 000 FCFA"));
        assert!(body.contains("1/2025"));
    }
}

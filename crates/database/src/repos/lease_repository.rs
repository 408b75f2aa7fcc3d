//! Repository for lease data access operations.

use crate::entities::{CreateLeaseRequest, Lease, LeaseStatus};
use crate::types::{RentalError, RentalResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const LEASE_COLUMNS: &str = "id, public_id, team_id, owner_id, property_id, tenant_name, \
     tenant_phone, tenant_email, property_address, monthly_amount, billing_day, start_date, \
     end_date, status, token_verified, token_revoked, last_access_at, created_at";

/// A lease matched by its access token hash, with the token expiry alongside.
#[derive(Debug, Clone)]
pub struct LeaseTokenMatch {
    pub lease: Lease,
    pub expires_at: String,
}

/// Repository for lease database operations
pub struct LeaseRepository {
    pool: SqlitePool,
}

impl LeaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new lease for a team
    pub async fn create(
        &self,
        team_id: i64,
        owner_id: i64,
        request: &CreateLeaseRequest,
    ) -> RentalResult<Lease> {
        if request.monthly_amount <= 0 {
            return Err(RentalError::InvalidInput(
                "monthly_amount must be positive".to_string(),
            ));
        }
        let billing_day = request.billing_day.unwrap_or(5);
        if !(1..=28).contains(&billing_day) {
            return Err(RentalError::InvalidInput(
                "billing_day must be between 1 and 28".to_string(),
            ));
        }

        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO leases (public_id, team_id, owner_id, property_id, tenant_name, \
             tenant_phone, tenant_email, property_address, monthly_amount, billing_day, \
             start_date, end_date, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(team_id)
        .bind(owner_id)
        .bind(request.property_id)
        .bind(&request.tenant_name)
        .bind(&request.tenant_phone)
        .bind(&request.tenant_email)
        .bind(&request.property_address)
        .bind(request.monthly_amount)
        .bind(billing_day)
        .bind(&request.start_date)
        .bind(&request.end_date)
        .bind(LeaseStatus::Active.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        let lease_id = result.last_insert_rowid();

        info!(
            lease_id = lease_id,
            public_id = %public_id,
            team_id = team_id,
            "created new lease"
        );

        Ok(Lease {
            id: lease_id,
            public_id,
            team_id,
            owner_id,
            property_id: request.property_id,
            tenant_name: request.tenant_name.clone(),
            tenant_phone: request.tenant_phone.clone(),
            tenant_email: request.tenant_email.clone(),
            property_address: request.property_address.clone(),
            monthly_amount: request.monthly_amount,
            billing_day,
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
            status: LeaseStatus::Active,
            token_verified: false,
            token_revoked: false,
            last_access_at: None,
            created_at: now,
        })
    }

    /// Find leases for a team, optionally filtered by status
    pub async fn find_by_team(
        &self,
        team_id: i64,
        status: Option<LeaseStatus>,
    ) -> RentalResult<Vec<Lease>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {LEASE_COLUMNS} FROM leases \
                     WHERE team_id = ? AND status = ? ORDER BY created_at DESC"
                ))
                .bind(team_id)
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {LEASE_COLUMNS} FROM leases \
                     WHERE team_id = ? ORDER BY created_at DESC"
                ))
                .bind(team_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_lease_row).collect()
    }

    /// Find a lease by its internal ID, scoped to a team
    pub async fn find_by_id(&self, team_id: i64, lease_id: i64) -> RentalResult<Option<Lease>> {
        let row = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE id = ? AND team_id = ?"
        ))
        .bind(lease_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_lease_row).transpose()
    }

    /// Find a lease by its public ID, scoped to a team
    pub async fn find_by_public_id(
        &self,
        team_id: i64,
        public_id: &str,
    ) -> RentalResult<Option<Lease>> {
        let row = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE public_id = ? AND team_id = ?"
        ))
        .bind(public_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_lease_row).transpose()
    }

    /// Load a lease without team scoping. Reserved for system paths that
    /// resolve the team from the lease itself (webhooks, tenant portal).
    pub async fn find_by_id_unscoped(&self, lease_id: i64) -> RentalResult<Option<Lease>> {
        let row = sqlx::query(&format!("SELECT {LEASE_COLUMNS} FROM leases WHERE id = ?"))
            .bind(lease_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        row.map(map_lease_row).transpose()
    }

    /// Find all active leases across teams. Used by the monthly generator.
    pub async fn find_all_active(&self) -> RentalResult<Vec<Lease>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE status = 'active' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_lease_row).collect()
    }

    /// Find active leases bound to a tenant email
    pub async fn find_active_by_tenant_email(&self, email: &str) -> RentalResult<Vec<Lease>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM leases \
             WHERE tenant_email = ? AND status = 'active' ORDER BY created_at DESC"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_lease_row).collect()
    }

    /// Terminate an active lease
    pub async fn terminate(&self, team_id: i64, lease_id: i64) -> RentalResult<()> {
        let result = sqlx::query(
            "UPDATE leases SET status = 'terminated', end_date = COALESCE(end_date, ?) \
             WHERE id = ? AND team_id = ? AND status = 'active'",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(lease_id)
        .bind(team_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::LeaseNotFound);
        }

        info!(lease_id = lease_id, team_id = team_id, "terminated lease");
        Ok(())
    }

    /// Store a fresh access token hash, resetting verification state
    pub async fn set_access_token(
        &self,
        lease_id: i64,
        token_hash: &str,
        expires_at: &str,
    ) -> RentalResult<()> {
        let result = sqlx::query(
            "UPDATE leases SET access_token_hash = ?, token_expires_at = ?, \
             token_verified = 0, token_revoked = 0 WHERE id = ?",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(lease_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::LeaseNotFound);
        }
        Ok(())
    }

    /// Find a lease by access token hash, with the token expiry
    pub async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> RentalResult<Option<LeaseTokenMatch>> {
        let row = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS}, token_expires_at FROM leases WHERE access_token_hash = ?"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => {
                let expires_at: Option<String> = row
                    .try_get("token_expires_at")
                    .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
                Ok(Some(LeaseTokenMatch {
                    lease: map_lease_row(row)?,
                    expires_at: expires_at.unwrap_or_default(),
                }))
            }
            None => Ok(None),
        }
    }

    /// Mark the current token as identity-verified
    pub async fn mark_token_verified(&self, lease_id: i64) -> RentalResult<()> {
        sqlx::query("UPDATE leases SET token_verified = 1 WHERE id = ?")
            .bind(lease_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Revoke the current token
    pub async fn revoke_token(&self, lease_id: i64) -> RentalResult<()> {
        sqlx::query("UPDATE leases SET token_revoked = 1 WHERE id = ?")
            .bind(lease_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

        info!(lease_id = lease_id, "revoked tenant access token");
        Ok(())
    }

    /// Record a successful tenant portal access
    pub async fn touch_last_access(&self, lease_id: i64) -> RentalResult<()> {
        sqlx::query("UPDATE leases SET last_access_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(lease_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn map_lease_row(row: sqlx::sqlite::SqliteRow) -> RentalResult<Lease> {
    let status_str: String = row
        .try_get("status")
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
    let token_verified: i64 = row
        .try_get("token_verified")
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;
    let token_revoked: i64 = row
        .try_get("token_revoked")
        .map_err(|e| RentalError::DatabaseError(e.to_string()))?;

    Ok(Lease {
        id: row
            .try_get("id")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        team_id: row
            .try_get("team_id")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        owner_id: row
            .try_get("owner_id")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        property_id: row
            .try_get("property_id")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        tenant_name: row
            .try_get("tenant_name")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        tenant_phone: row
            .try_get("tenant_phone")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        tenant_email: row
            .try_get("tenant_email")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        property_address: row
            .try_get("property_address")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        monthly_amount: row
            .try_get("monthly_amount")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        billing_day: row
            .try_get("billing_day")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        start_date: row
            .try_get("start_date")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        end_date: row
            .try_get("end_date")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        status: LeaseStatus::from(status_str.as_str()),
        token_verified: token_verified != 0,
        token_revoked: token_revoked != 0,
        last_access_at: row
            .try_get("last_access_at")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| RentalError::DatabaseError(e.to_string()))?,
    })
}

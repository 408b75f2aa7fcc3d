//! Repository for lead data access operations.

use crate::entities::{CreateLeadRequest, Lead, LeadStatus};
use crate::types::{ListingError, ListingResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const LEAD_COLUMNS: &str =
    "id, public_id, team_id, property_id, name, phone, email, message, status, created_at, updated_at";

/// Repository for lead database operations
pub struct LeadRepository {
    pool: SqlitePool,
}

impl LeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an inbound contact from the public marketplace
    pub async fn create(&self, team_id: i64, request: &CreateLeadRequest) -> ListingResult<Lead> {
        if request.name.trim().is_empty() {
            return Err(ListingError::InvalidInput("name is required".to_string()));
        }
        if request.phone.is_none() && request.email.is_none() {
            return Err(ListingError::InvalidInput(
                "a phone number or email is required".to_string(),
            ));
        }

        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO leads (public_id, team_id, property_id, name, phone, email, message, \
             status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'nouveau', ?, ?)",
        )
        .bind(&public_id)
        .bind(team_id)
        .bind(request.property_id)
        .bind(&request.name)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.message)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        let lead_id = result.last_insert_rowid();

        info!(lead_id = lead_id, team_id = team_id, "recorded new lead");

        Ok(Lead {
            id: lead_id,
            public_id,
            team_id,
            property_id: request.property_id,
            name: request.name.clone(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            message: request.message.clone(),
            status: LeadStatus::New,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_team(&self, team_id: i64) -> ListingResult<Vec<Lead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE team_id = ? ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_lead_row).collect()
    }

    pub async fn find_by_public_id(
        &self,
        team_id: i64,
        public_id: &str,
    ) -> ListingResult<Option<Lead>> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE public_id = ? AND team_id = ?"
        ))
        .bind(public_id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        row.map(map_lead_row).transpose()
    }

    /// Move a lead through the pipeline. Backwards moves are rejected.
    pub async fn update_status(
        &self,
        team_id: i64,
        public_id: &str,
        next: LeadStatus,
    ) -> ListingResult<Lead> {
        let lead = self
            .find_by_public_id(team_id, public_id)
            .await?
            .ok_or(ListingError::LeadNotFound)?;

        if !lead.status.can_transition_to(next) {
            return Err(ListingError::InvalidTransition);
        }

        sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(lead.id)
            .execute(&self.pool)
            .await
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

        info!(lead_id = lead.id, status = %next, "moved lead through pipeline");

        self.find_by_public_id(team_id, public_id)
            .await?
            .ok_or(ListingError::LeadNotFound)
    }
}

fn map_lead_row(row: sqlx::sqlite::SqliteRow) -> ListingResult<Lead> {
    let status_str: String = row
        .try_get("status")
        .map_err(|e| ListingError::DatabaseError(e.to_string()))?;

    Ok(Lead {
        id: row
            .try_get("id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        team_id: row
            .try_get("team_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        property_id: row
            .try_get("property_id")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        phone: row
            .try_get("phone")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        email: row
            .try_get("email")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        message: row
            .try_get("message")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        status: LeadStatus::from(status_str.as_str()),
        created_at: row
            .try_get("created_at")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| ListingError::DatabaseError(e.to_string()))?,
    })
}

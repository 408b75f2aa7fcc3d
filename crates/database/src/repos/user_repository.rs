//! Repository for user and session data access operations.

use crate::entities::{Session, User};
use crate::types::{TeamError, TeamResult};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for user and session database operations
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user account
    pub async fn create(&self, email: &str, display_name: Option<&str>) -> TeamResult<User> {
        let public_id = cuid2::cuid();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (public_id, email, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(email)
        .bind(display_name)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                TeamError::EmailAlreadyExists
            } else {
                TeamError::DatabaseError(e.to_string())
            }
        })?;

        let user_id = result.last_insert_rowid();

        info!(user_id = user_id, public_id = %public_id, "created new user");

        Ok(User {
            id: user_id,
            public_id,
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            created_at: now,
        })
    }

    pub async fn find_by_id(&self, user_id: i64) -> TeamResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, public_id, email, display_name, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_user_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> TeamResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, public_id, email, display_name, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_user_row).transpose()
    }

    /// Open a bearer session for a user account
    pub async fn create_user_session(&self, user_id: i64, ttl_days: i64) -> TeamResult<Session> {
        self.create_session(Some(user_id), None, Duration::days(ttl_days))
            .await
    }

    /// Open a bearer session bound to a lease for the tenant portal
    pub async fn create_tenant_session(&self, lease_id: i64, ttl_hours: i64) -> TeamResult<Session> {
        self.create_session(None, Some(lease_id), Duration::hours(ttl_hours))
            .await
    }

    async fn create_session(
        &self,
        user_id: Option<i64>,
        lease_id: Option<i64>,
        ttl: Duration,
    ) -> TeamResult<Session> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = (now + ttl).to_rfc3339();
        let created_at = now.to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO sessions (token, user_id, lease_id, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(user_id)
        .bind(lease_id)
        .bind(&created_at)
        .bind(&expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        Ok(Session {
            id: result.last_insert_rowid(),
            token,
            user_id,
            lease_id,
            expires_at,
            created_at,
        })
    }

    /// Resolve a bearer token to a live session
    pub async fn find_valid_session(&self, token: &str) -> TeamResult<Session> {
        let row = sqlx::query(
            "SELECT id, token, user_id, lease_id, created_at, expires_at \
             FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        let row = row.ok_or(TeamError::InvalidSession)?;

        let expires_at: String = row
            .try_get("expires_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
        if expires_at <= Utc::now().to_rfc3339() {
            return Err(TeamError::SessionExpired);
        }

        Ok(Session {
            id: row
                .try_get("id")
                .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
            token: row
                .try_get("token")
                .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
            lease_id: row
                .try_get("lease_id")
                .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
            expires_at,
            created_at: row
                .try_get("created_at")
                .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        })
    }

    pub async fn delete_session(&self, token: &str) -> TeamResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Drop every session bound to a lease. Used when a token is revoked.
    pub async fn delete_lease_sessions(&self, lease_id: i64) -> TeamResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE lease_id = ?")
            .bind(lease_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired_sessions(&self) -> TeamResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn map_user_row(row: sqlx::sqlite::SqliteRow) -> TeamResult<User> {
    Ok(User {
        id: row
            .try_get("id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        email: row
            .try_get("email")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        display_name: row
            .try_get("display_name")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
    })
}

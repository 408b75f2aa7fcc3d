//! Magic-link access to the tenant portal.
//!
//! The flow is token first, identity second: a lease holds at most one
//! outstanding access token (only its SHA-256 hash is stored), and the
//! tenant must confirm their last name before a session is opened. Three
//! failed identity checks on the same token revoke it, and the failure
//! count survives restarts because it is derived from the audit log.

use crate::identity::matches_last_name;
use chrono::{Duration, Utc};
use keur_database::{
    AccessAction, AccessError, AccessLogRepository, Lease, LeaseRepository, LeaseStatus, Session,
    UserRepository,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const TOKEN_EXPIRATION_DAYS: i64 = 7;
pub const MAX_FAILED_ATTEMPTS: i64 = 3;
pub const TENANT_SESSION_TTL_HOURS: i64 = 24;

/// A freshly minted access token. The clear token only exists here and in
/// the link sent to the tenant.
#[derive(Debug)]
pub struct GeneratedToken {
    pub token: String,
    pub expires_at: String,
}

/// Request context recorded in the audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessContext<'a> {
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

pub struct MagicLinkService {
    leases: LeaseRepository,
    users: UserRepository,
    access_logs: AccessLogRepository,
}

impl MagicLinkService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            leases: LeaseRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            access_logs: AccessLogRepository::new(pool),
        }
    }

    /// Mint a new access token for an active lease, replacing any previous
    /// one and resetting the failure counter.
    pub async fn generate_token(
        &self,
        lease_id: i64,
        ctx: AccessContext<'_>,
    ) -> Result<GeneratedToken, AccessError> {
        let lease = self
            .leases
            .find_by_id_unscoped(lease_id)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?
            .ok_or(AccessError::TokenNotFound)?;

        if lease.status != LeaseStatus::Active {
            return Err(AccessError::LeaseInactive);
        }

        let token = generate_token_value();
        let expires_at = (Utc::now() + Duration::days(TOKEN_EXPIRATION_DAYS)).to_rfc3339();

        self.leases
            .set_access_token(lease_id, &hash_token(&token), &expires_at)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        self.access_logs
            .record(
                Some(lease_id),
                AccessAction::TokenGenerated,
                ctx.ip_address,
                ctx.user_agent,
                None,
            )
            .await?;

        info!(lease_id = lease_id, "generated tenant access token");

        Ok(GeneratedToken { token, expires_at })
    }

    /// Resolve a clear token to its lease, enforcing expiry, revocation and
    /// lease state. Every failure leaves an audit entry.
    pub async fn validate_token(
        &self,
        token: &str,
        ctx: AccessContext<'_>,
    ) -> Result<Lease, AccessError> {
        let matched = self
            .leases
            .find_by_token_hash(&hash_token(token))
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        let Some(matched) = matched else {
            self.log_failure(None, AccessAction::TokenValidationFailed, ctx, "unknown token")
                .await;
            return Err(AccessError::TokenNotFound);
        };

        let lease = matched.lease;

        if lease.token_revoked {
            self.log_failure(
                Some(lease.id),
                AccessAction::TokenValidationFailed,
                ctx,
                "token revoked",
            )
            .await;
            return Err(AccessError::TokenRevoked);
        }

        if matched.expires_at.is_empty() || matched.expires_at <= Utc::now().to_rfc3339() {
            self.log_failure(
                Some(lease.id),
                AccessAction::TokenValidationFailed,
                ctx,
                "token expired",
            )
            .await;
            return Err(AccessError::TokenExpired);
        }

        if lease.status != LeaseStatus::Active {
            self.log_failure(
                Some(lease.id),
                AccessAction::TokenValidationFailed,
                ctx,
                "lease inactive",
            )
            .await;
            return Err(AccessError::LeaseInactive);
        }

        self.access_logs
            .record(
                Some(lease.id),
                AccessAction::TokenValidated,
                ctx.ip_address,
                ctx.user_agent,
                None,
            )
            .await?;

        Ok(lease)
    }

    /// Confirm the tenant's identity and open a portal session. The token
    /// is revoked after `MAX_FAILED_ATTEMPTS` wrong last names; a correct
    /// answer after that is refused like any other use of a revoked token.
    pub async fn verify_identity(
        &self,
        token: &str,
        last_name: &str,
        ctx: AccessContext<'_>,
    ) -> Result<Session, AccessError> {
        let lease = self.validate_token(token, ctx).await?;

        let failed_attempts = self
            .access_logs
            .failed_attempts_since_token(lease.id)
            .await?;
        if failed_attempts >= MAX_FAILED_ATTEMPTS {
            self.revoke(&lease, ctx).await?;
            return Err(AccessError::TokenRevoked);
        }

        if !matches_last_name(&lease.tenant_name, last_name) {
            self.log_failure(
                Some(lease.id),
                AccessAction::IdentityVerificationFailed,
                ctx,
                "last name mismatch",
            )
            .await;

            if failed_attempts + 1 >= MAX_FAILED_ATTEMPTS {
                self.revoke(&lease, ctx).await?;
                return Err(AccessError::TokenRevoked);
            }
            return Err(AccessError::IdentityMismatch);
        }

        self.leases
            .mark_token_verified(lease.id)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;
        self.access_logs
            .record(
                Some(lease.id),
                AccessAction::IdentityVerified,
                ctx.ip_address,
                ctx.user_agent,
                None,
            )
            .await?;

        self.open_session(&lease, ctx).await
    }

    /// Open a session for a token whose identity check already passed.
    /// Lets a tenant reuse their link within its lifetime without
    /// re-answering the identity question.
    pub async fn resume_session(
        &self,
        token: &str,
        ctx: AccessContext<'_>,
    ) -> Result<Session, AccessError> {
        let lease = self.validate_token(token, ctx).await?;
        if !lease.token_verified {
            return Err(AccessError::IdentityMismatch);
        }
        self.open_session(&lease, ctx).await
    }

    async fn open_session(
        &self,
        lease: &Lease,
        ctx: AccessContext<'_>,
    ) -> Result<Session, AccessError> {
        let session = self
            .users
            .create_tenant_session(lease.id, TENANT_SESSION_TTL_HOURS)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;

        self.leases
            .touch_last_access(lease.id)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;
        self.access_logs
            .record(
                Some(lease.id),
                AccessAction::SessionCreated,
                ctx.ip_address,
                ctx.user_agent,
                None,
            )
            .await?;

        info!(lease_id = lease.id, "opened tenant portal session");
        Ok(session)
    }

    async fn revoke(&self, lease: &Lease, ctx: AccessContext<'_>) -> Result<(), AccessError> {
        self.leases
            .revoke_token(lease.id)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;
        self.users
            .delete_lease_sessions(lease.id)
            .await
            .map_err(|e| AccessError::DatabaseError(e.to_string()))?;
        self.access_logs
            .record(
                Some(lease.id),
                AccessAction::TokenRevoked,
                ctx.ip_address,
                ctx.user_agent,
                Some("too many failed identity checks"),
            )
            .await?;

        warn!(lease_id = lease.id, "revoked tenant access token after repeated failures");
        Ok(())
    }

    async fn log_failure(
        &self,
        lease_id: Option<i64>,
        action: AccessAction,
        ctx: AccessContext<'_>,
        reason: &str,
    ) {
        // The audit write must not mask the original failure.
        if let Err(e) = self
            .access_logs
            .record(lease_id, action, ctx.ip_address, ctx.user_agent, Some(reason))
            .await
        {
            warn!("failed to record access log entry: {}", e);
        }
    }
}

fn generate_token_value() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keur_database::migrations::MIGRATOR;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();

        let now = Utc::now().to_rfc3339();
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
             VALUES ('l_test', 1, 1, 'Mamadou Ndiayé', 250000, 5, '2025-01-01', 'active', ?)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn ctx() -> AccessContext<'static> {
        AccessContext {
            ip_address: Some("41.82.0.1"),
            user_agent: Some("test-agent"),
        }
    }

    #[tokio::test]
    async fn test_full_happy_path() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool);

        let generated = service.generate_token(1, ctx()).await.unwrap();
        assert_eq!(generated.token.len(), 64);

        let lease = service.validate_token(&generated.token, ctx()).await.unwrap();
        assert_eq!(lease.id, 1);
        assert!(!lease.token_verified);

        // Accent-insensitive, any word of the recorded name.
        let session = service
            .verify_identity(&generated.token, "ndiaye", ctx())
            .await
            .unwrap();
        assert_eq!(session.lease_id, Some(1));

        // The link can be reused without re-answering.
        let resumed = service.resume_session(&generated.token, ctx()).await.unwrap();
        assert_eq!(resumed.lease_id, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool);

        assert!(matches!(
            service.validate_token("0".repeat(64).as_str(), ctx()).await,
            Err(AccessError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool.clone());

        let generated = service.generate_token(1, ctx()).await.unwrap();

        sqlx::query("UPDATE leases SET token_expires_at = '2020-01-01T00:00:00+00:00' WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            service.validate_token(&generated.token, ctx()).await,
            Err(AccessError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_three_failures_revoke_token() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool);

        let generated = service.generate_token(1, ctx()).await.unwrap();

        for attempt in 1..=MAX_FAILED_ATTEMPTS {
            let result = service
                .verify_identity(&generated.token, "wrong-name", ctx())
                .await;
            if attempt < MAX_FAILED_ATTEMPTS {
                assert!(matches!(result, Err(AccessError::IdentityMismatch)));
            } else {
                assert!(matches!(result, Err(AccessError::TokenRevoked)));
            }
        }

        // The right answer no longer helps.
        assert!(matches!(
            service.verify_identity(&generated.token, "ndiaye", ctx()).await,
            Err(AccessError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_new_token_resets_failure_count() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool);

        let first = service.generate_token(1, ctx()).await.unwrap();
        for _ in 0..2 {
            let _ = service.verify_identity(&first.token, "wrong", ctx()).await;
        }

        // Re-issuing clears revocation state and the counter.
        let second = service.generate_token(1, ctx()).await.unwrap();
        let _ = service.verify_identity(&second.token, "wrong", ctx()).await;
        let session = service.verify_identity(&second.token, "Ndiayé", ctx()).await;
        assert!(session.is_ok());

        // The old token no longer matches anything.
        assert!(matches!(
            service.validate_token(&first.token, ctx()).await,
            Err(AccessError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_terminated_lease_refused() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool.clone());

        let generated = service.generate_token(1, ctx()).await.unwrap();
        sqlx::query("UPDATE leases SET status = 'terminated' WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            service.validate_token(&generated.token, ctx()).await,
            Err(AccessError::LeaseInactive)
        ));
        assert!(matches!(
            service.generate_token(1, ctx()).await,
            Err(AccessError::LeaseInactive)
        ));
    }

    #[tokio::test]
    async fn test_resume_requires_prior_verification() {
        let pool = create_test_pool().await;
        let service = MagicLinkService::new(pool);

        let generated = service.generate_token(1, ctx()).await.unwrap();
        assert!(matches!(
            service.resume_session(&generated.token, ctx()).await,
            Err(AccessError::IdentityMismatch)
        ));
    }
}

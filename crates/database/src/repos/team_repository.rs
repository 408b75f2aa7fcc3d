//! Repository for team and membership data access operations.

use crate::entities::{
    BillingCycle, SubscriptionStatus, SubscriptionTier, SubscriptionUpdate, Team, TeamMember,
    TeamRole,
};
use crate::types::{TeamError, TeamResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

const TEAM_COLUMNS: &str = "id, public_id, name, created_by, stripe_customer_id, \
     stripe_subscription_id, subscription_status, subscription_tier, billing_cycle, \
     subscription_trial_ends_at, subscription_started_at, trial_used, created_at";

/// Repository for team database operations
pub struct TeamRepository {
    pool: SqlitePool,
}

impl TeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a team and enroll its creator as owner
    pub async fn create(&self, name: &str, created_by: i64) -> TeamResult<Team> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO teams (public_id, name, created_by, subscription_status, created_at) \
             VALUES (?, ?, ?, 'incomplete', ?)",
        )
        .bind(&public_id)
        .bind(name)
        .bind(created_by)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        let team_id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, created_at) VALUES (?, ?, 'owner', ?)",
        )
        .bind(team_id)
        .bind(created_by)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        info!(team_id = team_id, public_id = %public_id, "created new team");

        Ok(Team {
            id: team_id,
            public_id,
            name: name.to_string(),
            created_by,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            subscription_status: SubscriptionStatus::Incomplete,
            subscription_tier: None,
            billing_cycle: None,
            subscription_trial_ends_at: None,
            subscription_started_at: None,
            trial_used: false,
            created_at: now,
        })
    }

    pub async fn find_by_id(&self, team_id: i64) -> TeamResult<Option<Team>> {
        let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"))
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_team_row).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> TeamResult<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_team_row).transpose()
    }

    /// Resolve a team from the billing provider's customer reference
    pub async fn find_by_stripe_customer(&self, customer_id: &str) -> TeamResult<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE stripe_customer_id = ?"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_team_row).transpose()
    }

    pub async fn find_by_stripe_subscription(
        &self,
        subscription_id: &str,
    ) -> TeamResult<Option<Team>> {
        let row = sqlx::query(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE stripe_subscription_id = ?"
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_team_row).transpose()
    }

    /// Apply the fields a subscription webhook carries. Absent fields are
    /// left untouched.
    pub async fn update_subscription(
        &self,
        team_id: i64,
        update: &SubscriptionUpdate,
    ) -> TeamResult<()> {
        let mut set_clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Option<String>> = Vec::new();

        if let Some(customer_id) = &update.stripe_customer_id {
            set_clauses.push("stripe_customer_id = ?");
            values.push(Some(customer_id.clone()));
        }
        if let Some(subscription_id) = &update.stripe_subscription_id {
            set_clauses.push("stripe_subscription_id = ?");
            values.push(Some(subscription_id.clone()));
        }
        if let Some(status) = update.subscription_status {
            set_clauses.push("subscription_status = ?");
            values.push(Some(status.to_string()));
        }
        if let Some(tier) = update.subscription_tier {
            set_clauses.push("subscription_tier = ?");
            values.push(Some(tier.to_string()));
        }
        if let Some(cycle) = update.billing_cycle {
            set_clauses.push("billing_cycle = ?");
            values.push(Some(cycle.to_string()));
        }
        if let Some(trial_ends) = &update.subscription_trial_ends_at {
            set_clauses.push("subscription_trial_ends_at = ?");
            values.push(trial_ends.clone());
        }
        if let Some(started_at) = &update.subscription_started_at {
            set_clauses.push("subscription_started_at = ?");
            values.push(Some(started_at.clone()));
        }
        if let Some(trial_used) = update.trial_used {
            set_clauses.push("trial_used = ?");
            values.push(Some(if trial_used { "1" } else { "0" }.to_string()));
        }

        if set_clauses.is_empty() {
            return Ok(());
        }

        let query = format!("UPDATE teams SET {} WHERE id = ?", set_clauses.join(", "));

        let mut query_builder = sqlx::query(&query);
        for value in &values {
            query_builder = query_builder.bind(value);
        }
        query_builder = query_builder.bind(team_id);

        let result = query_builder
            .execute(&self.pool)
            .await
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(TeamError::TeamNotFound);
        }

        info!(team_id = team_id, "updated team subscription state");
        Ok(())
    }

    /// Add a user to a team
    pub async fn add_member(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> TeamResult<TeamMember> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        Ok(TeamMember {
            id: result.last_insert_rowid(),
            team_id,
            user_id,
            role,
            created_at: now,
        })
    }

    /// Find a user's membership in a team
    pub async fn find_membership(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> TeamResult<Option<TeamMember>> {
        let row = sqlx::query(
            "SELECT id, team_id, user_id, role, created_at FROM team_members \
             WHERE team_id = ? AND user_id = ?",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        row.map(map_member_row).transpose()
    }

    /// Teams a user belongs to, oldest membership first
    pub async fn find_teams_for_user(&self, user_id: i64) -> TeamResult<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT t.id, t.public_id, t.name, t.created_by, t.stripe_customer_id, \
                 t.stripe_subscription_id, t.subscription_status, t.subscription_tier, \
                 t.billing_cycle, t.subscription_trial_ends_at, t.subscription_started_at, \
                 t.trial_used, t.created_at \
             FROM teams t JOIN team_members m ON m.team_id = t.id \
             WHERE m.user_id = ? ORDER BY m.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(map_team_row).collect()
    }
}

fn map_team_row(row: sqlx::sqlite::SqliteRow) -> TeamResult<Team> {
    let status_str: String = row
        .try_get("subscription_status")
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
    let tier_str: Option<String> = row
        .try_get("subscription_tier")
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
    let cycle_str: Option<String> = row
        .try_get("billing_cycle")
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;
    let trial_used: i64 = row
        .try_get("trial_used")
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

    Ok(Team {
        id: row
            .try_get("id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        public_id: row
            .try_get("public_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        created_by: row
            .try_get("created_by")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        stripe_customer_id: row
            .try_get("stripe_customer_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        stripe_subscription_id: row
            .try_get("stripe_subscription_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        subscription_status: SubscriptionStatus::from(status_str.as_str()),
        subscription_tier: tier_str.as_deref().and_then(SubscriptionTier::parse),
        billing_cycle: cycle_str.as_deref().map(BillingCycle::from),
        subscription_trial_ends_at: row
            .try_get("subscription_trial_ends_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        subscription_started_at: row
            .try_get("subscription_started_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        trial_used: trial_used != 0,
        created_at: row
            .try_get("created_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
    })
}

fn map_member_row(row: sqlx::sqlite::SqliteRow) -> TeamResult<TeamMember> {
    let role_str: String = row
        .try_get("role")
        .map_err(|e| TeamError::DatabaseError(e.to_string()))?;

    Ok(TeamMember {
        id: row
            .try_get("id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        team_id: row
            .try_get("team_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
        role: TeamRole::from(role_str.as_str()),
        created_at: row
            .try_get("created_at")
            .map_err(|e| TeamError::DatabaseError(e.to_string()))?,
    })
}

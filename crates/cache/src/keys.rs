//! Cache key builders and TTL policy for the rental read models.
//!
//! Every cached read has one canonical key built here, and `rental_keys`
//! lists everything a rental write can stale so invalidation stays in one
//! place.

use std::time::Duration;

pub const TTL_LEASES: Duration = Duration::from_secs(300);
pub const TTL_TRANSACTIONS: Duration = Duration::from_secs(300);
pub const TTL_STATS: Duration = Duration::from_secs(600);
pub const TTL_LATE_PAYMENTS: Duration = Duration::from_secs(300);
pub const TTL_LEASE_DETAIL: Duration = Duration::from_secs(600);
pub const TTL_LEASE_MESSAGES: Duration = Duration::from_secs(60);
pub const TTL_ADVANCED_STATS: Duration = Duration::from_secs(600);
pub const TTL_REVENUE_HISTORY: Duration = Duration::from_secs(600);
pub const TTL_TENANT_DASHBOARD: Duration = Duration::from_secs(300);
pub const TTL_TENANT_PAYMENTS: Duration = Duration::from_secs(300);
pub const TTL_PROPERTY_REVIEWS: Duration = Duration::from_secs(600);

/// Revenue-history window sizes the dashboard requests.
pub const REVENUE_HISTORY_WINDOWS: [i64; 3] = [6, 12, 24];

const LEASE_STATUS_FILTERS: [&str; 3] = ["all", "active", "terminated"];

pub fn leases_key(team_id: i64, status: Option<&str>) -> String {
    format!("leases:{}:{}", team_id, status.unwrap_or("all"))
}

pub fn transactions_key(team_id: i64) -> String {
    format!("rental_transactions:team:{team_id}")
}

pub fn stats_key(team_id: i64) -> String {
    format!("rental_stats:{team_id}")
}

pub fn late_payments_key(team_id: i64) -> String {
    format!("late_payments:{team_id}")
}

pub fn lease_detail_key(lease_id: i64) -> String {
    format!("lease_detail:{lease_id}")
}

pub fn lease_messages_key(lease_id: i64) -> String {
    format!("lease_messages:{lease_id}")
}

pub fn advanced_stats_key(team_id: i64) -> String {
    format!("advanced_stats:{team_id}")
}

pub fn revenue_history_key(team_id: i64, months: i64) -> String {
    format!("revenue_history:{team_id}:{months}")
}

pub fn tenant_dashboard_key(email: &str) -> String {
    format!("tenant_dashboard:{}", email.to_lowercase())
}

pub fn tenant_payments_key(lease_id: i64) -> String {
    format!("tenant_payments:{lease_id}")
}

pub fn property_reviews_key(property_id: i64) -> String {
    format!("property_reviews:{property_id}")
}

/// Every key a rental mutation on this team can stale. Pass the lease when
/// the write touched one so its detail keys are dropped too.
pub fn rental_keys(team_id: i64, lease_id: Option<i64>) -> Vec<String> {
    let mut keys = Vec::new();

    for status in LEASE_STATUS_FILTERS {
        keys.push(leases_key(team_id, Some(status)));
    }
    keys.push(transactions_key(team_id));
    keys.push(stats_key(team_id));
    keys.push(late_payments_key(team_id));
    keys.push(advanced_stats_key(team_id));
    for months in REVENUE_HISTORY_WINDOWS {
        keys.push(revenue_history_key(team_id, months));
    }

    if let Some(lease_id) = lease_id {
        keys.push(lease_detail_key(lease_id));
        keys.push(lease_messages_key(lease_id));
        keys.push(tenant_payments_key(lease_id));
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rental_keys_cover_team_and_lease() {
        let keys = rental_keys(7, Some(42));
        assert!(keys.contains(&"leases:7:active".to_string()));
        assert!(keys.contains(&"rental_transactions:team:7".to_string()));
        assert!(keys.contains(&"rental_stats:7".to_string()));
        assert!(keys.contains(&"late_payments:7".to_string()));
        assert!(keys.contains(&"advanced_stats:7".to_string()));
        assert!(keys.contains(&"revenue_history:7:12".to_string()));
        assert!(keys.contains(&"lease_detail:42".to_string()));
        assert!(keys.contains(&"lease_messages:42".to_string()));
        assert!(keys.contains(&"tenant_payments:42".to_string()));
    }

    #[test]
    fn test_rental_keys_without_lease() {
        let keys = rental_keys(7, None);
        assert!(!keys.iter().any(|k| k.starts_with("lease_detail:")));
        assert!(keys.contains(&"leases:7:all".to_string()));
    }

    #[test]
    fn test_tenant_dashboard_key_is_case_insensitive() {
        assert_eq!(
            tenant_dashboard_key("Awa@Example.SN"),
            tenant_dashboard_key("awa@example.sn")
        );
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "keurimmo.toml",
    "config/keurimmo.toml",
    "crates/config/keurimmo.toml",
    "../keurimmo.toml",
    "../config/keurimmo.toml",
    "backend/keurimmo.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub stripe: StripeConfig,
    pub paydunya: PayDunyaConfig,
    pub mail: MailConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Public origin used when building links sent to tenants.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://keurimmo.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Cache settings. When `url` is empty the service runs without a cache
/// (every read falls through to the database).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "CacheConfig::default_namespace")]
    pub namespace: String,
    /// How long the cache stays disabled after a quota or connection error.
    #[serde(default = "CacheConfig::default_disable_window")]
    pub disable_window_seconds: u64,
}

impl CacheConfig {
    fn default_namespace() -> String {
        "keurimmo".to_string()
    }

    const fn default_disable_window() -> u64 {
        60
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            namespace: Self::default_namespace(),
            disable_window_seconds: Self::default_disable_window(),
        }
    }
}

/// Stripe keys and the price-ID table used to resolve a subscription tier
/// when the subscription metadata carries no `plan_id`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StripeConfig {
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub price_starter: Vec<String>,
    #[serde(default)]
    pub price_pro: Vec<String>,
    #[serde(default)]
    pub price_enterprise: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PayDunyaConfig {
    #[serde(default)]
    pub master_key: Option<String>,
    #[serde(default = "PayDunyaConfig::default_mode")]
    pub mode: String,
}

impl PayDunyaConfig {
    fn default_mode() -> String {
        "test".to_string()
    }
}

/// Transactional mail provider (HTTP API). Left unconfigured, sends become
/// log lines instead of failures.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "MailConfig::default_from")]
    pub from: String,
}

impl MailConfig {
    fn default_from() -> String {
        "no-reply@keurimmo.sn".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    /// Shared secret for the catch-up and cron endpoints (`x-admin-secret`).
    #[serde(default)]
    pub catch_up_secret: Option<String>,
}

/// Load the application configuration by combining defaults, an optional
/// TOML file, and `KEURIMMO__*` environment overrides.
///
/// ```
/// std::env::remove_var("KEURIMMO_CONFIG");
///
/// let config = keur_config::load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default("cache.namespace", defaults.cache.namespace.clone())
        .unwrap()
        .set_default(
            "cache.disable_window_seconds",
            defaults.cache.disable_window_seconds as i64,
        )
        .unwrap()
        .set_default("paydunya.mode", defaults.paydunya.mode.clone())
        .unwrap()
        .set_default("mail.from", defaults.mail.from.clone())
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("KEURIMMO").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("KEURIMMO_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via KEURIMMO_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_load_without_file_or_env() {
        std::env::remove_var("KEURIMMO_CONFIG");
        let config = load().unwrap();

        assert_eq!(config.http.port, 7080);
        assert_eq!(config.cache.namespace, "keurimmo");
        assert!(config.stripe.webhook_secret.is_none());
        assert!(config.admin.catch_up_secret.is_none());
    }

    #[test]
    #[serial]
    fn config_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("keurimmo.toml");
        std::fs::write(
            &path,
            r#"
[http]
address = "0.0.0.0"
port = 9000

[paydunya]
master_key = "mk_test"
mode = "live"
"#,
        )
        .unwrap();

        std::env::set_var("KEURIMMO_CONFIG", &path);
        let config = load().unwrap();
        std::env::remove_var("KEURIMMO_CONFIG");

        assert_eq!(config.http.port, 9000);
        assert_eq!(config.paydunya.master_key.as_deref(), Some("mk_test"));
        assert_eq!(config.paydunya.mode, "live");
    }
}

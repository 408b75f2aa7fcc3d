//! Fail-open cache client.
//!
//! Redis being down must never take a request down with it: every cache
//! failure is logged, counted and treated as a miss. After an error the
//! backend is sidelined for a short window so a dead or quota-limited
//! instance is not hammered on every request.

use crate::metrics::{CacheMetrics, MetricsSnapshot};
use keur_config::CacheConfig;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone)]
enum CacheBackend {
    Redis(ConnectionManager),
    Memory(Arc<Mutex<HashMap<String, (String, Option<Instant>)>>>),
    Disabled,
}

#[derive(Clone)]
pub struct CacheClient {
    backend: CacheBackend,
    namespace: String,
    metrics: Arc<CacheMetrics>,
    disabled_until: Arc<Mutex<Option<Instant>>>,
    disable_window: Duration,
}

impl CacheClient {
    /// Connect to the configured backend. Connection failures downgrade to
    /// a disabled cache instead of failing startup.
    pub async fn connect(config: &CacheConfig) -> Self {
        let backend = match &config.url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("redis connection established");
                        CacheBackend::Redis(conn)
                    }
                    Err(e) => {
                        warn!("failed to connect to redis, proceeding without cache: {}", e);
                        CacheBackend::Disabled
                    }
                },
                Err(e) => {
                    warn!("failed to create redis client, proceeding without cache: {}", e);
                    CacheBackend::Disabled
                }
            },
            None => {
                info!("no cache url configured, cache disabled");
                CacheBackend::Disabled
            }
        };

        Self::with_backend(backend, config.namespace.clone(), config.disable_window_seconds)
    }

    /// In-process cache with TTL semantics. Used by tests and single-node
    /// deployments without redis.
    pub fn memory(namespace: &str) -> Self {
        Self::with_backend(
            CacheBackend::Memory(Arc::new(Mutex::new(HashMap::new()))),
            namespace.to_string(),
            60,
        )
    }

    pub fn disabled() -> Self {
        Self::with_backend(CacheBackend::Disabled, "keurimmo".to_string(), 60)
    }

    fn with_backend(backend: CacheBackend, namespace: String, disable_window_seconds: u64) -> Self {
        Self {
            backend,
            namespace,
            metrics: Arc::new(CacheMetrics::new()),
            disabled_until: Arc::new(Mutex::new(None)),
            disable_window: Duration::from_secs(disable_window_seconds),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn is_sidelined(&self) -> bool {
        let mut guard = match self.disabled_until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match *guard {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                *guard = None;
                false
            }
            None => false,
        }
    }

    fn sideline(&self) {
        let mut guard = match self.disabled_until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Instant::now() + self.disable_window);
        warn!(
            window_seconds = self.disable_window.as_secs(),
            "cache backend sidelined after error"
        );
    }

    /// Read a raw value. Errors and sidelined backends read as a miss.
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        if self.is_sidelined() {
            return None;
        }
        let full_key = self.namespaced(key);

        match &self.backend {
            CacheBackend::Redis(conn) => {
                let mut conn = conn.clone();
                match conn.get::<_, Option<String>>(&full_key).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(key = %full_key, "redis get failed: {}", e);
                        self.metrics.record_error();
                        self.sideline();
                        None
                    }
                }
            }
            CacheBackend::Memory(store) => {
                let mut store = match store.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match store.get(&full_key) {
                    Some((_, Some(expiry))) if *expiry <= Instant::now() => {
                        store.remove(&full_key);
                        None
                    }
                    Some((value, _)) => Some(value.clone()),
                    None => None,
                }
            }
            CacheBackend::Disabled => None,
        }
    }

    /// Write a raw value with a TTL. Failures are logged and swallowed.
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) {
        if self.is_sidelined() {
            return;
        }
        let full_key = self.namespaced(key);

        match &self.backend {
            CacheBackend::Redis(conn) => {
                let mut conn = conn.clone();
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(&full_key, value, ttl.as_secs())
                    .await
                {
                    warn!(key = %full_key, "redis set failed: {}", e);
                    self.metrics.record_error();
                    self.sideline();
                }
            }
            CacheBackend::Memory(store) => {
                let mut store = match store.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                store.insert(
                    full_key,
                    (value.to_string(), Some(Instant::now() + ttl)),
                );
            }
            CacheBackend::Disabled => {}
        }
    }

    /// Drop a batch of keys. Failures are logged and swallowed.
    pub async fn invalidate(&self, keys: &[String]) {
        if keys.is_empty() || self.is_sidelined() {
            return;
        }
        let full_keys: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();

        match &self.backend {
            CacheBackend::Redis(conn) => {
                let mut conn = conn.clone();
                if let Err(e) = conn.del::<_, ()>(full_keys.clone()).await {
                    warn!("redis del failed: {}", e);
                    self.metrics.record_error();
                    self.sideline();
                } else {
                    debug!(count = full_keys.len(), "invalidated cache keys");
                }
            }
            CacheBackend::Memory(store) => {
                let mut store = match store.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for key in &full_keys {
                    store.remove(key);
                }
            }
            CacheBackend::Disabled => {}
        }
    }

    /// Cache-aside read: serve the cached value when present, otherwise run
    /// the producer and cache its result. Producer errors pass through
    /// untouched and nothing is cached for them.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let cached = self.get_raw(key).await;
        self.metrics
            .record_latency(started.elapsed().as_micros() as u64);

        if let Some(raw) = cached {
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.metrics.record_hit();
                    debug!(key = key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    // Stale shape from an older build; fall through to the producer.
                    warn!(key = key, "failed to decode cached value: {}", e);
                    self.metrics.record_error();
                }
            }
        }

        self.metrics.record_miss();
        debug!(key = key, "cache miss");

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => self.set_raw(key, &raw, ttl).await,
            Err(e) => {
                warn!(key = key, "failed to encode value for cache: {}", e);
                self.metrics.record_error();
            }
        }

        Ok(value)
    }
}

//! Keurimmo Cache Crate
//!
//! Cache-aside layer over redis for the rental read models. The cache is
//! strictly an accelerator: every operation fails open so the database
//! remains the source of truth when redis is unavailable.

pub mod client;
pub mod keys;
pub mod metrics;

pub use client::CacheClient;
pub use metrics::{CacheMetrics, MetricsSnapshot};

//! Persistence backends for session state, audit turns, and the result cache.
//!
//! One [`Store`] trait, two implementations: JSON files on disk
//! ([`FileStore`]) and SQLite ([`SqliteStore`]). The pipeline only ever
//! talks to the trait, so the storage mode is a configuration choice.

mod file;
mod sqlite;

pub use file::FileStore;
pub use sqlite::SqliteStore;

use crate::types::{ConversationTurn, Location, SessionState};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use roam_common::config::{StorageConfig, StorageMode};
use roam_common::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How long a cached payload stays valid.
pub const CACHE_TTL_SECS: i64 = 3600;

/// The two independently cached data domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    Weather,
    Places,
}

impl std::fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weather => write!(f, "weather"),
            Self::Places => write!(f, "places"),
        }
    }
}

/// Compute the cache key for a domain and coordinate.
///
/// Coordinates round to two decimals (~1.1 km) so nearby lookups alias to
/// the same entry and the hit rate stays useful.
pub fn cache_key(domain: CacheDomain, lat: f64, lon: f64) -> String {
    format!("{}_{:.2}_{:.2}", domain, round2(lat), round2(lon))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Stored cache record: opaque payload plus the TTL clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheEnvelope {
    pub payload: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

impl CacheEnvelope {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            cached_at: Utc::now(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at <= Duration::seconds(CACHE_TTL_SECS)
    }
}

/// Persistence operations the pipeline needs.
///
/// Every operation is an atomic per-key upsert; no multi-key transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name (e.g., "file", "sqlite").
    fn name(&self) -> &str;

    /// Append one turn to the audit log. Write-only: the pipeline never
    /// reads turns back to drive resolution.
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// Load session state, returning the default for an unseen session.
    async fn get_session_state(&self, session_id: &str) -> Result<SessionState>;

    /// Overwrite the tracked location. Latest explicit mention wins; other
    /// state fields are preserved.
    async fn update_location(&self, session_id: &str, location: &Location) -> Result<()>;

    /// Union the given identifiers into the session's shown set.
    async fn add_shown_places(&self, session_id: &str, places: &[String]) -> Result<()>;

    /// Delete session state. Returns true if state existed. The audit log
    /// is untouched.
    async fn reset_session(&self, session_id: &str) -> Result<bool>;

    /// Fetch a fresh cache payload, or `None` on miss/expiry.
    async fn cache_get(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
    ) -> Result<Option<serde_json::Value>>;

    /// Unconditional upsert; resets the TTL clock.
    async fn cache_put(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
        payload: &serde_json::Value,
    ) -> Result<()>;

    /// Health check, true if the backend is operational.
    async fn health_check(&self) -> bool;
}

/// Build the configured storage backend.
pub fn from_config(storage: &StorageConfig) -> Result<Arc<dyn Store>> {
    let data_dir = storage.data_dir();
    let store: Arc<dyn Store> = match storage.mode {
        StorageMode::Local => Arc::new(FileStore::new(&data_dir)?),
        StorageMode::Sqlite => Arc::new(SqliteStore::new(&data_dir)?),
    };
    tracing::info!(backend = store.name(), dir = %data_dir.display(), "Storage initialized");
    Ok(store)
}

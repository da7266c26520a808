//! SQLite-backed storage.
//!
//! One database file holds audit turns, session state, and the result
//! cache. Connections open per call inside `spawn_blocking` so the async
//! runtime never blocks on database IO.

use super::{cache_key, CacheDomain, CacheEnvelope, Store};
use crate::types::{ConversationTurn, Location, SessionState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roam_common::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// SQLite store at `{data_dir}/roam.db`.
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("roam.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Persistence(format!("opening {}: {e}", db_path.display())))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);

            CREATE TABLE IF NOT EXISTS session_states (
                session_id TEXT PRIMARY KEY,
                current_location TEXT,
                current_lat REAL,
                current_lon REAL,
                shown_places TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS result_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::Persistence(format!("initializing schema: {e}")))?;

        Ok(Self { db_path })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| Error::Persistence(format!("opening database: {e}")))?;
            op(&conn).map_err(|e| Error::Persistence(e.to_string()))
        })
        .await
        .map_err(|e| Error::Persistence(format!("blocking task failed: {e}")))?
    }
}

fn parse_shown_places(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let turn = turn.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO turns (session_id, user_message, bot_response, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    turn.session_id,
                    turn.user_message,
                    turn.bot_response,
                    turn.timestamp.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_session_state(&self, session_id: &str) -> Result<SessionState> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT current_location, current_lat, current_lon, shown_places
                     FROM session_states WHERE session_id = ?1",
                    params![session_id],
                    |row| {
                        Ok(SessionState {
                            current_location: row.get(0)?,
                            current_lat: row.get(1)?,
                            current_lon: row.get(2)?,
                            shown_places: parse_shown_places(&row.get::<_, String>(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(row.unwrap_or_default())
        })
        .await
    }

    async fn update_location(&self, session_id: &str, location: &Location) -> Result<()> {
        let session_id = session_id.to_string();
        let location = location.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO session_states (session_id, current_location, current_lat, current_lon, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(session_id) DO UPDATE SET
                     current_location = excluded.current_location,
                     current_lat = excluded.current_lat,
                     current_lon = excluded.current_lon,
                     updated_at = excluded.updated_at",
                params![
                    session_id,
                    location.name,
                    location.lat,
                    location.lon,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_shown_places(&self, session_id: &str, places: &[String]) -> Result<()> {
        let session_id = session_id.to_string();
        let places = places.to_vec();
        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT shown_places FROM session_states WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;

            let mut shown = existing.as_deref().map(parse_shown_places).unwrap_or_default();
            for place in places {
                if !shown.contains(&place) {
                    shown.push(place);
                }
            }

            let shown_json = serde_json::to_string(&shown).unwrap_or_else(|_| "[]".into());
            conn.execute(
                "INSERT INTO session_states (session_id, shown_places, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                     shown_places = excluded.shown_places,
                     updated_at = excluded.updated_at",
                params![session_id, shown_json, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn reset_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM session_states WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn cache_get(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
    ) -> Result<Option<serde_json::Value>> {
        let key = cache_key(domain, lat, lon);
        self.with_conn(move |conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT payload, cached_at FROM result_cache WHERE cache_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((payload, cached_at)) = row else {
                return Ok(None);
            };

            let fresh = DateTime::parse_from_rfc3339(&cached_at)
                .map(|t| {
                    Utc::now() - t.with_timezone(&Utc)
                        <= chrono::Duration::seconds(super::CACHE_TTL_SECS)
                })
                .unwrap_or(false);

            if !fresh {
                conn.execute("DELETE FROM result_cache WHERE cache_key = ?1", params![key])?;
                return Ok(None);
            }

            Ok(serde_json::from_str(&payload).ok())
        })
        .await
    }

    async fn cache_put(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let key = cache_key(domain, lat, lon);
        let envelope = CacheEnvelope::new(payload.clone());
        let payload_json = serde_json::to_string(&envelope.payload)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO result_cache (cache_key, payload, cached_at)
                 VALUES (?1, ?2, ?3)",
                params![key, payload_json, envelope.cached_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> bool {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .is_ok()
    }
}

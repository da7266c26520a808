//! JSON file-backed storage.
//!
//! Layout under the data directory:
//! - `chats/{session}.json`: audit turns, one array per session
//! - `state/{session}.json`: session state
//! - `cache/{key}.json`: cache entries, stale files unlinked on read

use super::{cache_key, CacheDomain, CacheEnvelope, Store};
use crate::types::{ConversationTurn, Location, SessionState};
use async_trait::async_trait;
use chrono::Utc;
use roam_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Local file-backed store.
pub struct FileStore {
    chats_dir: PathBuf,
    state_dir: PathBuf,
    cache_dir: PathBuf,
}

/// Session ids are opaque caller input; keep filenames boring.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl FileStore {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let chats_dir = base_dir.join("chats");
        let state_dir = base_dir.join("state");
        let cache_dir = base_dir.join("cache");
        std::fs::create_dir_all(&chats_dir)?;
        std::fs::create_dir_all(&state_dir)?;
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            chats_dir,
            state_dir,
            cache_dir,
        })
    }

    fn chat_file(&self, session_id: &str) -> PathBuf {
        self.chats_dir.join(format!("{}.json", sanitize(session_id)))
    }

    fn state_file(&self, session_id: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", sanitize(session_id)))
    }

    fn cache_file(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    async fn read_state(&self, session_id: &str) -> Result<Option<SessionState>> {
        let path = self.state_file(session_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write_state(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let path = self.state_file(session_id);
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::Persistence(format!("writing {}: {e}", path.display())))
    }
}

#[async_trait]
impl Store for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let path = self.chat_file(&turn.session_id);
        let mut turns: Vec<ConversationTurn> = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };

        turns.push(turn.clone());
        let content = serde_json::to_string_pretty(&turns)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::Persistence(format!("writing {}: {e}", path.display())))
    }

    async fn get_session_state(&self, session_id: &str) -> Result<SessionState> {
        Ok(self.read_state(session_id).await?.unwrap_or_default())
    }

    async fn update_location(&self, session_id: &str, location: &Location) -> Result<()> {
        let mut state = self.get_session_state(session_id).await?;
        state.set_location(location);
        self.write_state(session_id, &state).await
    }

    async fn add_shown_places(&self, session_id: &str, places: &[String]) -> Result<()> {
        let mut state = self.get_session_state(session_id).await?;
        for place in places {
            if !state.shown_places.contains(place) {
                state.shown_places.push(place.clone());
            }
        }
        self.write_state(session_id, &state).await
    }

    async fn reset_session(&self, session_id: &str) -> Result<bool> {
        let path = self.state_file(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Persistence(format!(
                "removing {}: {e}",
                path.display()
            ))),
        }
    }

    async fn cache_get(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
    ) -> Result<Option<serde_json::Value>> {
        let key = cache_key(domain, lat, lon);
        let path = self.cache_file(&key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };

        let envelope: CacheEnvelope = serde_json::from_str(&content)?;
        if !envelope.is_fresh(Utc::now()) {
            // Eagerly delete the expired entry.
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    async fn cache_put(
        &self,
        domain: CacheDomain,
        lat: f64,
        lon: f64,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let key = cache_key(domain, lat, lon);
        let path = self.cache_file(&key);
        let envelope = CacheEnvelope::new(payload.clone());
        let content = serde_json::to_string_pretty(&envelope)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Error::Persistence(format!("writing {}: {e}", path.display())))
    }

    async fn health_check(&self) -> bool {
        self.state_dir.is_dir() && self.cache_dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn paris() -> Location {
        Location {
            name: "Paris".into(),
            lat: 48.8566,
            lon: 2.3522,
            display_name: None,
        }
    }

    #[tokio::test]
    async fn fresh_session_is_default() {
        let (_dir, store) = store();
        let state = store.get_session_state("s1").await.unwrap();
        assert!(state.current_location.is_none());
        assert!(state.shown_places.is_empty());
    }

    #[tokio::test]
    async fn update_location_overwrites() {
        let (_dir, store) = store();
        store.update_location("s1", &paris()).await.unwrap();
        store
            .update_location(
                "s1",
                &Location {
                    name: "Tokyo".into(),
                    lat: 35.68,
                    lon: 139.76,
                    display_name: None,
                },
            )
            .await
            .unwrap();

        let state = store.get_session_state("s1").await.unwrap();
        assert_eq!(state.current_location.as_deref(), Some("Tokyo"));
        assert_eq!(state.current_lat, Some(35.68));
    }

    #[tokio::test]
    async fn shown_places_union_preserves_order() {
        let (_dir, store) = store();
        store
            .add_shown_places("s1", &["Louvre".into(), "Eiffel Tower".into()])
            .await
            .unwrap();
        store
            .add_shown_places("s1", &["Eiffel Tower".into(), "Notre Dame".into()])
            .await
            .unwrap();

        let state = store.get_session_state("s1").await.unwrap();
        assert_eq!(state.shown_places, vec!["Louvre", "Eiffel Tower", "Notre Dame"]);
    }

    #[tokio::test]
    async fn location_update_preserves_shown_places() {
        let (_dir, store) = store();
        store.add_shown_places("s1", &["Louvre".into()]).await.unwrap();
        store.update_location("s1", &paris()).await.unwrap();

        let state = store.get_session_state("s1").await.unwrap();
        assert_eq!(state.shown_places, vec!["Louvre"]);
        assert_eq!(state.current_location.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn reset_deletes_state_only() {
        let (_dir, store) = store();
        store.update_location("s1", &paris()).await.unwrap();
        store
            .append_turn(&ConversationTurn::new("s1", "hi", "hello"))
            .await
            .unwrap();

        assert!(store.reset_session("s1").await.unwrap());
        assert!(!store.reset_session("s1").await.unwrap());

        let state = store.get_session_state("s1").await.unwrap();
        assert!(state.current_location.is_none());
    }

    #[tokio::test]
    async fn cache_round_trip_and_expiry() {
        let (dir, store) = store();
        let payload = serde_json::json!({"temperature": 21.5});

        store
            .cache_put(CacheDomain::Weather, 48.85, 2.35, &payload)
            .await
            .unwrap();
        let hit = store.cache_get(CacheDomain::Weather, 48.85, 2.35).await.unwrap();
        assert_eq!(hit, Some(payload.clone()));

        // Same rounded key from a nearby coordinate.
        let hit = store.cache_get(CacheDomain::Weather, 48.851, 2.349).await.unwrap();
        assert_eq!(hit, Some(payload.clone()));

        // Other domain is independent.
        assert!(store
            .cache_get(CacheDomain::Places, 48.85, 2.35)
            .await
            .unwrap()
            .is_none());

        // Backdate the entry past the TTL; the read deletes the file.
        let key = cache_key(CacheDomain::Weather, 48.85, 2.35);
        let path = dir.path().join("cache").join(format!("{key}.json"));
        let stale = CacheEnvelope {
            payload,
            cached_at: Utc::now() - chrono::Duration::minutes(61),
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(store
            .cache_get(CacheDomain::Weather, 48.85, 2.35)
            .await
            .unwrap()
            .is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn append_turn_accumulates() {
        let (dir, store) = store();
        store
            .append_turn(&ConversationTurn::new("s1", "q1", "a1"))
            .await
            .unwrap();
        store
            .append_turn(&ConversationTurn::new("s1", "q2", "a2"))
            .await
            .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("chats").join("s1.json")).unwrap();
        let turns: Vec<ConversationTurn> = serde_json::from_str(&content).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].user_message, "q2");
    }

    #[test]
    fn sanitize_keeps_filenames_boring() {
        assert_eq!(sanitize("user-123_abc"), "user-123_abc");
        assert_eq!(sanitize("../../etc/passwd"), "______etc_passwd");
    }
}

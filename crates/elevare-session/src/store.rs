use crate::state::SessionState;
use async_trait::async_trait;
use elevare_core::{ElevareError, ElevareResult, SessionId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Durable key-value persistence for session state.
///
/// Implementations report every storage failure as
/// [`ElevareError::Persistence`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, id: &SessionId, state: &SessionState) -> ElevareResult<()>;
    async fn load(&self, id: &SessionId) -> ElevareResult<Option<SessionState>>;
    async fn delete(&self, id: &SessionId) -> ElevareResult<()>;
    async fn list(&self) -> ElevareResult<Vec<SessionId>>;
}

pub(crate) fn persistence(context: &str, err: impl std::fmt::Display) -> ElevareError {
    ElevareError::Persistence(format!("{context}: {err}"))
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// File-based session store: one pretty-printed JSON file per session.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub async fn new(dir: PathBuf) -> ElevareResult<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| persistence("create session dir", e))?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, id: &SessionId, state: &SessionState) -> ElevareResult<()> {
        let path = self.session_path(id);
        let tmp = self.dir.join(format!(".{id}.json.tmp"));
        let json = serde_json::to_string_pretty(state)?;
        // Checkpoints are replaced atomically via rename.
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| persistence("write session", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence("commit session", e))?;
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> ElevareResult<Option<SessionState>> {
        let path = self.session_path(id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persistence("read session", e)),
        };
        let state: SessionState = serde_json::from_str(&data)
            .map_err(|e| persistence(&format!("parse session {id}"), e))?;
        Ok(Some(state))
    }

    async fn delete(&self, id: &SessionId) -> ElevareResult<()> {
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("delete session", e)),
        }
    }

    async fn list(&self) -> ElevareResult<Vec<SessionId>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| persistence("list sessions", e))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| persistence("list sessions", e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if let Ok(id) = SessionId::parse(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// Volatile store that keeps serialized state in a map.
///
/// Used for ephemeral deployments and tests. [`set_offline`](Self::set_offline)
/// simulates a storage outage: every call fails until it is switched back.
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<SessionId, String>>,
    offline: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> ElevareResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ElevareError::Persistence("storage unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, id: &SessionId, state: &SessionState) -> ElevareResult<()> {
        self.check_online()?;
        let json = serde_json::to_string(state)?;
        self.records.write().await.insert(id.clone(), json);
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> ElevareResult<Option<SessionState>> {
        self.check_online()?;
        let records = self.records.read().await;
        match records.get(id) {
            Some(json) => Ok(Some(
                serde_json::from_str(json).map_err(|e| persistence("parse session", e))?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &SessionId) -> ElevareResult<()> {
        self.check_online()?;
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> ElevareResult<Vec<SessionId>> {
        self.check_online()?;
        let mut ids: Vec<SessionId> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::StateKey;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        let id = SessionId::generate();
        let mut state = SessionState::new(Some("Tides".into()));
        state
            .set(StateKey::ResearchReport, serde_json::json!("# Tides"))
            .unwrap();

        store.save(&id, &state).await.unwrap();
        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        let id = SessionId::generate();
        store.save(&id, &SessionState::default()).await.unwrap();
        store.save(&id, &SessionState::default()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{id}.json")]);
    }

    #[tokio::test]
    async fn file_store_corrupt_file_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        let id = SessionId::parse("broken").unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        let err = store.load(&id).await.unwrap_err();
        assert!(matches!(err, ElevareError::Persistence(_)));
    }

    #[tokio::test]
    async fn memory_store_offline_fails_every_call() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.save(&id, &SessionState::default()).await.unwrap();

        store.set_offline(true);
        assert!(store.load(&id).await.is_err());
        assert!(store.save(&id, &SessionState::default()).await.is_err());
        assert!(store.list().await.is_err());

        store.set_offline(false);
        assert!(store.load(&id).await.unwrap().is_some());
    }
}

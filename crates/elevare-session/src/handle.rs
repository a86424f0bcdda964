use crate::state::{SessionState, StateKey};
use crate::store::SessionStore;
use elevare_core::{ElevareError, ElevareResult, SessionId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Live, in-memory handle on one session's state.
///
/// Reads may run concurrently; writes are serialized by the state lock.
/// The run lock is held for a whole pipeline run so that two pipelines never
/// interleave on the same session.
pub struct SessionHandle {
    id: SessionId,
    state: RwLock<SessionState>,
    run_lock: Arc<Mutex<()>>,
    persist_lock: Mutex<()>,
    version: AtomicU64,
    persisted_version: AtomicU64,
}

impl SessionHandle {
    fn new(id: SessionId, state: SessionState, persisted: bool) -> Self {
        Self {
            id,
            state: RwLock::new(state),
            run_lock: Arc::new(Mutex::new(())),
            persist_lock: Mutex::new(()),
            version: AtomicU64::new(1),
            persisted_version: AtomicU64::new(if persisted { 1 } else { 0 }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&*self.state.read().await)
    }

    pub async fn get(&self, key: StateKey) -> Option<Value> {
        self.state.read().await.get(key)
    }

    pub async fn set(&self, key: StateKey, value: Value) -> ElevareResult<()> {
        self.try_update(|state| state.set(key, value)).await
    }

    /// Applies `f` under the write lock and marks the session as changed.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.write().await;
        let out = f(&mut state);
        self.version.fetch_add(1, Ordering::SeqCst);
        out
    }

    /// Like [`update`](Self::update), but a closure returning `Err` leaves the
    /// session clean. The closure must not leave partial writes behind on error.
    pub async fn try_update<T, E>(
        &self,
        f: impl FnOnce(&mut SessionState) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.write().await;
        let out = f(&mut state)?;
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(out)
    }

    /// Waits until no other pipeline runs on this session, then holds it.
    pub async fn lock_run(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.run_lock).lock_owned().await
    }

    /// `true` while the in-memory state is ahead of the durable copy.
    pub fn is_dirty(&self) -> bool {
        self.version.load(Ordering::SeqCst) > self.persisted_version.load(Ordering::SeqCst)
    }

    async fn persist_to(&self, durable: &dyn SessionStore) -> ElevareResult<()> {
        let _guard = self.persist_lock.lock().await;
        let (snapshot, version) = {
            let state = self.state.read().await;
            (state.clone(), self.version.load(Ordering::SeqCst))
        };
        durable.save(&self.id, &snapshot).await?;
        self.persisted_version.fetch_max(version, Ordering::SeqCst);
        Ok(())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

/// The session state store: in-memory handles backed by a durable [`SessionStore`].
///
/// Reads and writes are always served from memory. `persist` flushes to
/// durable storage; when that fails the session stays dirty and is retried
/// by [`flush_dirty`](Self::flush_dirty).
pub struct StateStore {
    durable: Arc<dyn SessionStore>,
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl StateStore {
    pub fn new(durable: Arc<dyn SessionStore>) -> Self {
        Self {
            durable,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn durable(&self) -> &Arc<dyn SessionStore> {
        &self.durable
    }

    /// Returns the session, creating it when neither memory nor durable
    /// storage knows it. An existing state is never overwritten; a missing
    /// topic is filled in from `topic`.
    pub async fn create_if_absent(
        &self,
        id: &SessionId,
        topic: Option<String>,
    ) -> ElevareResult<Arc<SessionHandle>> {
        if let Some(handle) = self.handle(id).await? {
            if let Some(topic) = topic.filter(|t| !t.trim().is_empty()) {
                handle
                    .update(|state| {
                        if state.session.topic.is_none() {
                            state.session.topic = Some(topic);
                        }
                    })
                    .await;
            }
            return Ok(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                info!(session_id = %id, "Session created");
                Arc::new(SessionHandle::new(
                    id.clone(),
                    SessionState::new(topic),
                    false,
                ))
            })
            .clone();
        Ok(handle)
    }

    /// Looks the session up in memory, falling back to durable storage.
    pub async fn handle(&self, id: &SessionId) -> ElevareResult<Option<Arc<SessionHandle>>> {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Ok(Some(Arc::clone(handle)));
        }

        let Some(state) = self.durable.load(id).await? else {
            return Ok(None);
        };

        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "Session restored from storage");
                Arc::new(SessionHandle::new(id.clone(), state, true))
            })
            .clone();
        Ok(Some(handle))
    }

    async fn require(&self, id: &SessionId) -> ElevareResult<Arc<SessionHandle>> {
        self.handle(id)
            .await?
            .ok_or_else(|| ElevareError::SessionNotFound(id.to_string()))
    }

    pub async fn get(&self, id: &SessionId, key: StateKey) -> ElevareResult<Option<Value>> {
        Ok(self.require(id).await?.get(key).await)
    }

    pub async fn set(&self, id: &SessionId, key: StateKey, value: Value) -> ElevareResult<()> {
        self.require(id).await?.set(key, value).await
    }

    /// Flushes the in-memory state of `id` to durable storage.
    pub async fn persist(&self, id: &SessionId) -> ElevareResult<()> {
        let handle = self.require(id).await?;
        self.persist_handle(&handle).await
    }

    pub async fn persist_handle(&self, handle: &SessionHandle) -> ElevareResult<()> {
        match handle.persist_to(self.durable.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(session_id = %handle.id(), error = %e, "Checkpoint failed, session marked dirty");
                Err(match e {
                    ElevareError::Persistence(_) => e,
                    other => ElevareError::Persistence(other.to_string()),
                })
            }
        }
    }

    /// Reads the durable record directly, bypassing memory.
    pub async fn load(&self, id: &SessionId) -> ElevareResult<Option<SessionState>> {
        self.durable.load(id).await
    }

    pub async fn is_dirty(&self, id: &SessionId) -> bool {
        match self.sessions.read().await.get(id) {
            Some(handle) => handle.is_dirty(),
            None => false,
        }
    }

    /// Retries persistence for every dirty session. Returns how many were flushed.
    ///
    /// Flushed sessions no longer referenced outside the store are released.
    pub async fn flush_dirty(&self) -> usize {
        let dirty: Vec<Arc<SessionHandle>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|h| h.is_dirty())
            .cloned()
            .collect();

        let mut flushed = Vec::new();
        for handle in dirty {
            if self.persist_handle(&handle).await.is_ok() {
                flushed.push(handle.id().clone());
            }
        }
        if flushed.is_empty() {
            return 0;
        }

        // Sessions torn down during the outage could not be released then.
        let mut sessions = self.sessions.write().await;
        let mut released = 0;
        for id in &flushed {
            let detached = sessions
                .get(id)
                .is_some_and(|h| Arc::strong_count(h) == 1 && !h.is_dirty());
            if detached {
                sessions.remove(id);
                released += 1;
            }
        }
        info!(flushed = flushed.len(), released, "Dirty sessions persisted");
        flushed.len()
    }

    /// Drops the in-memory handle of `id` when nothing else uses it and its
    /// state is safely persisted. The durable record is kept.
    pub async fn release(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let releasable = sessions
            .get(id)
            .is_some_and(|h| Arc::strong_count(h) == 1 && !h.is_dirty());
        if releasable {
            sessions.remove(id);
            debug!(session_id = %id, "Session released from memory");
        }
        releasable
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use serde_json::json;

    fn store() -> (StateStore, Arc<MemorySessionStore>) {
        let durable = Arc::new(MemorySessionStore::new());
        (StateStore::new(durable.clone()), durable)
    }

    #[tokio::test]
    async fn create_if_absent_does_not_clobber() {
        let (store, _) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, Some("Bees".into())).await.unwrap();
        handle.set(StateKey::SessionValidated, json!(true)).await.unwrap();

        let again = store.create_if_absent(&id, Some("Wasps".into())).await.unwrap();
        let state = again.snapshot().await;
        assert!(state.is_validated());
        assert_eq!(state.session.topic.as_deref(), Some("Bees"));
    }

    #[tokio::test]
    async fn create_if_absent_fills_missing_topic() {
        let (store, _) = store();
        let id = SessionId::generate();
        store.create_if_absent(&id, None).await.unwrap();
        let handle = store.create_if_absent(&id, Some("Maps".into())).await.unwrap();
        assert_eq!(handle.snapshot().await.session.topic.as_deref(), Some("Maps"));
    }

    #[tokio::test]
    async fn get_set_on_unknown_session() {
        let (store, _) = store();
        let id = SessionId::generate();
        let err = store.get(&id, StateKey::SessionTopic).await.unwrap_err();
        assert!(matches!(err, ElevareError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn persist_and_reload_after_release() {
        let (store, _) = store();
        let id = SessionId::generate();
        store.create_if_absent(&id, Some("Comets".into())).await.unwrap();
        store
            .set(&id, StateKey::ResearchReport, json!("# Comets"))
            .await
            .unwrap();
        assert!(store.is_dirty(&id).await);

        store.persist(&id).await.unwrap();
        assert!(!store.is_dirty(&id).await);
        assert!(store.release(&id).await);
        assert_eq!(store.active_count().await, 0);

        let value = store.get(&id, StateKey::ResearchReport).await.unwrap();
        assert_eq!(value, Some(json!("# Comets")));
    }

    #[tokio::test]
    async fn outage_keeps_serving_memory_and_flags_dirty() {
        let (store, durable) = store();
        let id = SessionId::generate();
        store.create_if_absent(&id, None).await.unwrap();

        durable.set_offline(true);
        store.set(&id, StateKey::LessonPlan, json!("plan")).await.unwrap();
        let err = store.persist(&id).await.unwrap_err();
        assert!(matches!(err, ElevareError::Persistence(_)));
        assert!(store.is_dirty(&id).await);
        assert_eq!(
            store.get(&id, StateKey::LessonPlan).await.unwrap(),
            Some(json!("plan"))
        );
        assert!(!store.release(&id).await);
        assert_eq!(store.flush_dirty().await, 0);

        durable.set_offline(false);
        assert_eq!(store.flush_dirty().await, 1);
        assert!(!store.is_dirty(&id).await);
        let durable_copy = store.load(&id).await.unwrap().unwrap();
        assert_eq!(durable_copy.lessons.plan.as_deref(), Some("plan"));
    }

    #[tokio::test]
    async fn flush_releases_sessions_detached_during_outage() {
        let (store, durable) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, None).await.unwrap();

        durable.set_offline(true);
        handle.set(StateKey::LessonPlan, json!("plan")).await.unwrap();
        drop(handle);
        assert!(!store.release(&id).await);

        durable.set_offline(false);
        assert_eq!(store.flush_dirty().await, 1);
        assert_eq!(store.active_count().await, 0);
        let durable_copy = store.load(&id).await.unwrap().unwrap();
        assert_eq!(durable_copy.lessons.plan.as_deref(), Some("plan"));
    }

    #[tokio::test]
    async fn flush_keeps_sessions_still_in_use() {
        let (store, durable) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, None).await.unwrap();

        durable.set_offline(true);
        handle.set(StateKey::LessonPlan, json!("plan")).await.unwrap();
        durable.set_offline(false);
        assert_eq!(store.flush_dirty().await, 1);
        assert_eq!(store.active_count().await, 1);
        assert!(!handle.is_dirty());
    }

    #[tokio::test]
    async fn rejected_write_leaves_session_clean() {
        let (store, _) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, None).await.unwrap();
        store.persist(&id).await.unwrap();

        let err = handle
            .set(StateKey::SessionValidated, json!("not a bool"))
            .await
            .unwrap_err();
        assert!(matches!(err, ElevareError::Validation(_)));
        assert!(!handle.is_dirty());
        assert!(format!("{handle:?}").contains(id.as_str()));
    }

    #[tokio::test]
    async fn release_keeps_handles_in_use() {
        let (store, _) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, None).await.unwrap();
        store.persist(&id).await.unwrap();
        assert!(!store.release(&id).await);
        drop(handle);
        assert!(store.release(&id).await);
    }

    #[tokio::test]
    async fn run_lock_serializes_pipelines() {
        let (store, _) = store();
        let id = SessionId::generate();
        let handle = store.create_if_absent(&id, None).await.unwrap();

        let guard = handle.lock_run().await;
        let other = Arc::clone(&handle);
        let waiter = tokio::spawn(async move {
            let _g = other.lock_run().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}

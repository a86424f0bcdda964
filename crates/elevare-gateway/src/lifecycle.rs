use elevare_core::{ElevareError, ElevareResult, SessionId};
use elevare_pipeline::{PipelineEngine, PipelineInput, PipelineKind, RunStatus};
use elevare_session::SessionHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Body of `POST /session`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub topic: Option<String>,
    /// Reuse an existing id instead of generating one.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub confirmation: String,
}

/// Creates, admits and tears down sessions around the pipeline engine.
pub struct SessionLifecycle {
    engine: Arc<PipelineEngine>,
}

impl SessionLifecycle {
    pub fn new(engine: Arc<PipelineEngine>) -> Self {
        Self { engine }
    }

    /// Creates the session (or reuses it) and runs the entry pipeline to completion.
    ///
    /// Running against an already validated session is answered from memoized
    /// state without touching any capability.
    pub async fn create(&self, request: CreateSessionRequest) -> ElevareResult<CreateSessionResponse> {
        let id = match request.session_id.as_deref() {
            Some(raw) => SessionId::parse(raw)?,
            None => SessionId::generate(),
        };
        let store = self.engine.store();
        let handle = store.create_if_absent(&id, request.topic.clone()).await?;

        let input = PipelineInput {
            topic: request.topic,
        };
        let (_, outcome) = self
            .engine
            .run(PipelineKind::Entry, &handle, input, &CancellationToken::new())
            .await;

        let result = match outcome.status {
            RunStatus::Completed => {
                let confirmation = handle
                    .read(|state| state.session.confirmation_message.clone())
                    .await
                    .unwrap_or_default();
                info!(session_id = %id, cached = outcome.cache_hits > 0, "Session ready");
                Ok(CreateSessionResponse {
                    session_id: id.to_string(),
                    confirmation,
                })
            }
            RunStatus::Failed { stage, error } => {
                Err(ElevareError::Gateway(format!("{stage} failed: {error}")))
            }
            RunStatus::Rejected { reason } => Err(ElevareError::Validation(reason)),
            other => Err(ElevareError::Gateway(format!("entry pipeline ended as {other:?}"))),
        };

        drop(handle);
        store.release(&id).await;
        result
    }

    /// Admits a duplex connection: the session must exist and be validated.
    pub async fn admit(&self, raw_id: &str) -> ElevareResult<Arc<SessionHandle>> {
        let id = SessionId::parse(raw_id)
            .map_err(|_| ElevareError::SessionNotFound(raw_id.to_string()))?;
        let handle = self
            .engine
            .store()
            .handle(&id)
            .await?
            .ok_or_else(|| ElevareError::SessionNotFound(id.to_string()))?;
        if !handle.read(|state| state.is_validated()).await {
            return Err(ElevareError::SessionNotReady(id.to_string()));
        }
        Ok(handle)
    }

    /// Persists what the connection left behind and releases the in-memory handle.
    pub async fn teardown(&self, handle: Arc<SessionHandle>) {
        let id = handle.id().clone();
        let store = self.engine.store();
        if handle.is_dirty() {
            if let Err(e) = store.persist_handle(&handle).await {
                warn!(session_id = %id, error = %e, "Session left dirty at teardown");
            }
        }
        drop(handle);
        store.release(&id).await;
        info!(session_id = %id, "Session detached");
    }
}

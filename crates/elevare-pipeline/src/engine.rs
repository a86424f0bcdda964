use crate::pipeline::Pipeline;
use crate::retry::retry_once;
use crate::stage::{check_output, Stage, StageContext, StageOutput};
use crate::types::{PipelineInput, PipelineKind, RunOutcome, RunStatus};
use elevare_capabilities::Capabilities;
use elevare_core::{PipelineEvent, StageFailure};
use elevare_session::{SessionHandle, SessionState, StateStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 64;

/// Per-attempt time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub stage_timeout: Duration,
    /// Limit for long-running stages (deep research).
    pub research_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(120),
            research_timeout: Duration::from_secs(600),
        }
    }
}

/// A started run: its event stream and the task driving it.
///
/// The stream is finite and closes when the run ends.
pub struct PipelineRun {
    pub events: mpsc::Receiver<PipelineEvent>,
    pub handle: JoinHandle<RunOutcome>,
}

/// Runs pipelines against sessions in a [`StateStore`].
///
/// Stages run strictly in order, one attempt at a time, while the session's
/// run lock is held. Every stage result is committed and checkpointed before
/// its events are sent.
pub struct PipelineEngine {
    store: Arc<StateStore>,
    capabilities: Capabilities,
    config: EngineConfig,
}

enum Step {
    Continue,
    Stop(RunStatus),
}

impl PipelineEngine {
    pub fn new(store: Arc<StateStore>, capabilities: Capabilities, config: EngineConfig) -> Self {
        Self {
            store,
            capabilities,
            config,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Spawns a run of `kind` and returns its event stream.
    pub fn start(
        self: &Arc<Self>,
        kind: PipelineKind,
        session: Arc<SessionHandle>,
        input: PipelineInput,
        cancel: CancellationToken,
    ) -> PipelineRun {
        let pipeline = Pipeline::build(kind, &self.capabilities);
        self.start_pipeline(pipeline, session, input, cancel)
    }

    pub fn start_pipeline(
        self: &Arc<Self>,
        pipeline: Pipeline,
        session: Arc<SessionHandle>,
        input: PipelineInput,
        cancel: CancellationToken,
    ) -> PipelineRun {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            engine.drive(&pipeline, &session, input, &cancel, tx).await
        });
        PipelineRun { events: rx, handle }
    }

    /// Runs `kind` to the end and returns every emitted event with the outcome.
    pub async fn run(
        &self,
        kind: PipelineKind,
        session: &SessionHandle,
        input: PipelineInput,
        cancel: &CancellationToken,
    ) -> (Vec<PipelineEvent>, RunOutcome) {
        let pipeline = Pipeline::build(kind, &self.capabilities);
        self.run_pipeline(&pipeline, session, input, cancel).await
    }

    pub async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        session: &SessionHandle,
        input: PipelineInput,
        cancel: &CancellationToken,
    ) -> (Vec<PipelineEvent>, RunOutcome) {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let drain = async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        };
        let (outcome, events) = tokio::join!(self.drive(pipeline, session, input, cancel, tx), drain);
        (events, outcome)
    }

    async fn drive(
        &self,
        pipeline: &Pipeline,
        session: &SessionHandle,
        input: PipelineInput,
        cancel: &CancellationToken,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> RunOutcome {
        let kind = pipeline.kind();
        let mut outcome = RunOutcome::new(kind);
        let session_id = session.id().clone();

        let _run_guard = tokio::select! {
            guard = session.lock_run() => guard,
            _ = cancel.cancelled() => {
                outcome.status = RunStatus::Cancelled;
                return outcome;
            }
        };

        info!(session_id = %session_id, pipeline = %kind, "Pipeline started");

        if kind.requires_validation() && !session.read(SessionState::is_validated).await {
            info!(session_id = %session_id, pipeline = %kind, "Session not validated, nothing to run");
            outcome.status = RunStatus::Completed;
            self.emit(&tx, &mut outcome, PipelineEvent::completed(kind.name())).await;
            return outcome;
        }

        let topic = match self.prepare(pipeline, session, input).await {
            Ok(topic) => topic,
            Err(reason) => {
                warn!(session_id = %session_id, pipeline = %kind, %reason, "Pipeline rejected");
                outcome.status = RunStatus::Rejected { reason };
                return outcome;
            }
        };

        for (index, stage) in pipeline.stages().iter().enumerate() {
            outcome.status = RunStatus::Running { stage_index: index };
            match self
                .run_stage(stage.as_ref(), session, topic.clone(), cancel, &tx, &mut outcome)
                .await
            {
                Step::Continue => outcome.stages_completed += 1,
                Step::Stop(status) => {
                    outcome.status = status;
                    self.checkpoint(session, &mut outcome).await;
                    return outcome;
                }
            }
        }

        if kind == PipelineKind::Entry {
            session
                .update(|state| state.session.is_validated = true)
                .await;
        }
        self.checkpoint(session, &mut outcome).await;

        outcome.status = RunStatus::Completed;
        self.emit(&tx, &mut outcome, PipelineEvent::completed(kind.name())).await;
        info!(
            session_id = %session_id,
            pipeline = %kind,
            stages = outcome.stages_completed,
            cache_hits = outcome.cache_hits,
            "Pipeline completed"
        );
        outcome
    }

    /// Resolves the run's topic and clears memoized results of a previous topic.
    async fn prepare(
        &self,
        pipeline: &Pipeline,
        session: &SessionHandle,
        input: PipelineInput,
    ) -> Result<Option<String>, String> {
        let requested = input.topic.filter(|t| !t.trim().is_empty()).map(|t| t.trim().to_string());
        let (Some(namespace), Some(topic_key)) = (pipeline.namespace(), pipeline.topic_key()) else {
            return Ok(match requested {
                Some(topic) => Some(topic),
                None => session.read(|state| state.session.topic.clone()).await,
            });
        };

        let (memoized, session_topic) = session
            .read(|state| {
                let memoized = state.get(topic_key).and_then(|v| v.as_str().map(str::to_string));
                (memoized, state.session.topic.clone())
            })
            .await;

        let Some(topic) = requested.or_else(|| memoized.clone()).or(session_topic) else {
            return Err(format!("{} needs a topic", pipeline.kind()));
        };

        let same_topic = memoized
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(&topic));
        if !same_topic {
            session
                .try_update(|state| {
                    let mut next = state.clone();
                    if memoized.is_some() {
                        info!(session_id = %session.id(), ?namespace, %topic, "Topic changed, clearing memoized results");
                        next.clear_namespace(namespace);
                    }
                    next.set(topic_key, topic.clone().into())?;
                    *state = next;
                    Ok::<_, elevare_core::ElevareError>(())
                })
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(Some(topic))
    }

    async fn run_stage(
        &self,
        stage: &dyn Stage,
        session: &SessionHandle,
        topic: Option<String>,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<PipelineEvent>,
        outcome: &mut RunOutcome,
    ) -> Step {
        if cancel.is_cancelled() {
            return Step::Stop(RunStatus::Cancelled);
        }

        let ctx = StageContext {
            session_id: session.id().clone(),
            state: session.snapshot().await,
            topic,
        };

        let output = match retry_once(stage.name(), |attempt| self.attempt(stage, &ctx, cancel, attempt)).await {
            Ok(output) => output,
            Err(e) if e.is_cancelled() => {
                info!(session_id = %ctx.session_id, stage = stage.name(), "Stage cancelled");
                return Step::Stop(RunStatus::Cancelled);
            }
            Err(e) => {
                error!(session_id = %ctx.session_id, stage = stage.name(), error = %e, "Pipeline failed");
                return Step::Stop(RunStatus::Failed {
                    stage: e.stage,
                    error: e.failure.to_string(),
                });
            }
        };

        let output = if output.is_cached() {
            outcome.cache_hits += 1;
            output
        } else {
            match commit(session, stage, &output).await {
                Ok(committed) => {
                    self.checkpoint(session, outcome).await;
                    committed
                }
                Err(e) => {
                    error!(session_id = %ctx.session_id, stage = stage.name(), error = %e, "Commit failed");
                    return Step::Stop(RunStatus::Failed {
                        stage: stage.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        };

        for event in stage.events(&output) {
            if !self.emit(tx, outcome, event).await {
                return Step::Stop(RunStatus::Cancelled);
            }
        }
        Step::Continue
    }

    /// One attempt under the stage timeout, abandoned as soon as `cancel` fires.
    async fn attempt(
        &self,
        stage: &dyn Stage,
        ctx: &StageContext,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<StageOutput, StageFailure> {
        let limit = if stage.long_running() {
            self.config.research_timeout
        } else {
            self.config.stage_timeout
        };
        debug!(session_id = %ctx.session_id, stage = stage.name(), attempt, "Stage attempt");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageFailure::Cancelled),
            result = tokio::time::timeout(limit, stage.execute(ctx)) => {
                let output = result.map_err(|_| StageFailure::Timeout(limit))??;
                check_output(stage, &output)?;
                Ok(output)
            }
        }
    }

    async fn checkpoint(&self, session: &SessionHandle, outcome: &mut RunOutcome) {
        if !session.is_dirty() {
            return;
        }
        // Failures are logged by the store; the session stays dirty and is retried later.
        outcome.persisted = self.store.persist_handle(session).await.is_ok();
    }

    async fn emit(
        &self,
        tx: &mpsc::Sender<PipelineEvent>,
        outcome: &mut RunOutcome,
        event: PipelineEvent,
    ) -> bool {
        let event_type = event.event_type;
        if tx.send(event).await.is_err() {
            debug!(event = %event_type, "Event receiver dropped");
            return false;
        }
        outcome.events.push(event_type);
        true
    }
}

/// Writes every output value in one update and reads the stored form back.
async fn commit(
    session: &SessionHandle,
    stage: &dyn Stage,
    output: &StageOutput,
) -> elevare_core::ElevareResult<StageOutput> {
    session
        .try_update(|state| {
            let mut next = state.clone();
            for (key, value) in output.values() {
                next.set(*key, value.clone())?;
            }
            *state = next;
            Ok(StageOutput::from_state(state, stage.outputs(), false))
        })
        .await
}

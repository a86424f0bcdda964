use async_trait::async_trait;
use elevare_core::{EventType, PipelineEvent, SessionId, StageFailure};
use elevare_session::{is_populated, SessionState, StateKey};
use serde_json::Value;
use tracing::debug;

/// What a stage sees: a snapshot of the session taken right before it runs.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub session_id: SessionId,
    pub state: SessionState,
    /// The topic resolved for this run, if the pipeline has one.
    pub topic: Option<String>,
}

impl StageContext {
    pub fn require_topic(&self) -> Result<&str, StageFailure> {
        self.topic
            .as_deref()
            .ok_or_else(|| StageFailure::InvalidOutput("no topic for this run".into()))
    }

    /// Text stored at `key`, failing when an earlier stage left it empty.
    pub fn require_text(&self, key: StateKey) -> Result<String, StageFailure> {
        match self.state.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(text),
            _ => Err(StageFailure::InvalidOutput(format!("{key} is not available"))),
        }
    }
}

/// Values a stage produced, keyed by the state path they are committed to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    values: Vec<(StateKey, Value)>,
    cached: bool,
}

impl StageOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: StateKey, value: impl Into<Value>) -> Self {
        self.values.push((key, value.into()));
        self
    }

    /// Reads `keys` back from `state`.
    pub(crate) fn from_state(state: &SessionState, keys: &[StateKey], cached: bool) -> Self {
        Self {
            values: keys
                .iter()
                .filter_map(|key| state.get(*key).map(|value| (*key, value)))
                .collect(),
            cached,
        }
    }

    pub fn get(&self, key: StateKey) -> Option<&Value> {
        self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// The value at `key`, or `fallback` when the stage did not produce it.
    pub fn value_or(&self, key: StateKey, fallback: Value) -> Value {
        self.get(key).cloned().unwrap_or(fallback)
    }

    pub fn values(&self) -> &[(StateKey, Value)] {
        &self.values
    }

    /// `true` when the output was read back from session state.
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

/// A single named unit of pipeline work.
///
/// A stage wraps exactly one capability call. It never retries: the engine
/// owns the retry policy and calls [`execute`](Stage::execute) once per attempt.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State keys this stage writes.
    fn outputs(&self) -> &'static [StateKey];

    /// Keys that must all be populated for a cache hit. Defaults to [`outputs`](Stage::outputs).
    fn cache_keys(&self) -> &'static [StateKey] {
        self.outputs()
    }

    /// Event types this stage emits, in order.
    fn emits(&self) -> &'static [EventType] {
        &[]
    }

    /// Stages calling slow capabilities get the long timeout.
    fn long_running(&self) -> bool {
        false
    }

    /// The capability call. Runs only on a cache miss.
    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure>;

    /// Events derived from this stage's output.
    fn events(&self, _output: &StageOutput) -> Vec<PipelineEvent> {
        Vec::new()
    }

    /// One attempt: the memoized value when present, otherwise [`compute`](Stage::compute).
    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let keys = self.cache_keys();
        if !keys.is_empty() && keys.iter().all(|key| ctx.state.is_populated(*key)) {
            debug!(session_id = %ctx.session_id, stage = self.name(), "Cache hit");
            return Ok(StageOutput::from_state(&ctx.state, self.outputs(), true));
        }
        self.compute(ctx).await
    }
}

/// Checks freshly computed output against the state schema before it is committed.
pub(crate) fn check_output(stage: &dyn Stage, output: &StageOutput) -> Result<(), StageFailure> {
    if output.is_cached() {
        return Ok(());
    }
    for (key, value) in output.values() {
        if !stage.outputs().contains(key) {
            return Err(StageFailure::InvalidOutput(format!(
                "{key} is not an output of this stage"
            )));
        }
        SessionState::validate(*key, value)
            .map_err(|e| StageFailure::InvalidOutput(e.to_string()))?;
    }
    for key in stage.cache_keys() {
        if !output.get(*key).is_some_and(is_populated) {
            return Err(StageFailure::InvalidOutput(format!("{key} is empty")));
        }
    }
    Ok(())
}

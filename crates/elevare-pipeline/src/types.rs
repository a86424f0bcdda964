use elevare_core::EventType;
use serde::{Deserialize, Serialize};

/// Which pipeline a command selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineKind {
    /// Session creation: a single confirmation stage. Not selectable by command.
    Entry,
    ResearchTopic,
    PlanLessons,
}

impl PipelineKind {
    /// Maps an inbound command type (already upper-cased) to a pipeline.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "RESEARCH_TOPIC" => Some(PipelineKind::ResearchTopic),
            "PLAN_LESSONS" => Some(PipelineKind::PlanLessons),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Entry => "ENTRY",
            PipelineKind::ResearchTopic => "RESEARCH_TOPIC",
            PipelineKind::PlanLessons => "PLAN_LESSONS",
        }
    }

    /// Content pipelines only run on sessions that finished the entry pipeline.
    pub fn requires_validation(&self) -> bool {
        !matches!(self, PipelineKind::Entry)
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields a command carries into a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub topic: Option<String>,
}

impl PipelineInput {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
        }
    }
}

/// Progress of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running { stage_index: usize },
    Completed,
    Failed { stage: String, error: String },
    /// The command could not start a run (e.g. no topic could be resolved).
    Rejected { reason: String },
    Cancelled,
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub pipeline: PipelineKind,
    pub status: RunStatus,
    /// Event types in the order they were emitted.
    pub events: Vec<EventType>,
    pub stages_completed: usize,
    /// Stages answered from session state without a capability call.
    pub cache_hits: usize,
    /// `false` when the final checkpoint could not be written.
    pub persisted: bool,
}

impl RunOutcome {
    pub(crate) fn new(pipeline: PipelineKind) -> Self {
        Self {
            pipeline,
            status: RunStatus::NotStarted,
            events: Vec::new(),
            stages_completed: 0,
            cache_hits: 0,
            persisted: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

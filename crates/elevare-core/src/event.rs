use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of event types a pipeline may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Text meant to be spoken to the learner.
    AudioTranscript,
    /// The full research report (markdown).
    ResearchReport,
    /// Raw context gathered while researching.
    ResearchContext,
    /// Source URLs the research drew on.
    ResearchSources,
    /// Image URLs found while researching.
    ResearchImages,
    /// Clears the client whiteboard.
    WhiteboardReset,
    /// Whiteboard items to draw.
    WhiteboardUpdate,
    /// Structured study guide.
    StudyGuide,
    /// Terminal event of every successful (or no-op) run.
    PipelineCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AudioTranscript => "AUDIO_TRANSCRIPT",
            EventType::ResearchReport => "RESEARCH_REPORT",
            EventType::ResearchContext => "RESEARCH_CONTEXT",
            EventType::ResearchSources => "RESEARCH_SOURCES",
            EventType::ResearchImages => "RESEARCH_IMAGES",
            EventType::WhiteboardReset => "WHITEBOARD_RESET",
            EventType::WhiteboardUpdate => "WHITEBOARD_UPDATE",
            EventType::StudyGuide => "STUDY_GUIDE",
            EventType::PipelineCompleted => "PIPELINE_COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::PipelineCompleted)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of pipeline progress, serialized as `{"type": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(rename = "message")]
    pub payload: serde_json::Value,
}

impl PipelineEvent {
    pub fn new(event_type: EventType, payload: impl Into<serde_json::Value>) -> Self {
        Self {
            event_type,
            payload: payload.into(),
        }
    }

    /// The terminal event for a run of `pipeline`.
    pub fn completed(pipeline: &str) -> Self {
        Self::new(
            EventType::PipelineCompleted,
            serde_json::json!({ "pipeline": pipeline }),
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

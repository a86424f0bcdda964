//! The concrete stages of the Elevare pipelines.

mod entry;
mod lessons;
mod research;

pub use entry::ConfirmationStage;
pub use lessons::{LessonPlanStage, LessonWalkthroughStage, StudyGuideStage};
pub use research::{ReportOutlineStage, ReportSummaryStage, ResearchStage};

use elevare_core::StageFailure;
use serde_json::Value;

pub(crate) fn text_output(text: String) -> Result<Value, StageFailure> {
    if text.trim().is_empty() {
        Err(StageFailure::InvalidOutput("capability returned empty text".into()))
    } else {
        Ok(Value::String(text.trim().to_string()))
    }
}

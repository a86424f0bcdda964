//! Session-scoped generation pipelines.
//!
//! A [`Pipeline`] is a fixed sequence of [`Stage`]s. The [`PipelineEngine`]
//! runs one against a session: each stage first looks for its memoized
//! result in the session state and only calls its capability on a miss,
//! failed attempts are retried once, results are committed and checkpointed,
//! and every stage's events are streamed in order, ending with
//! `PIPELINE_COMPLETED`.

pub mod engine;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod retry;
pub mod schema;
pub mod stage;
pub mod stages;
pub mod types;

pub use engine::{EngineConfig, PipelineEngine, PipelineRun};
pub use pipeline::Pipeline;
pub use render::{render_outline, WhiteboardItem};
pub use retry::retry_once;
pub use stage::{Stage, StageContext, StageOutput};
pub use types::{PipelineInput, PipelineKind, RunOutcome, RunStatus};

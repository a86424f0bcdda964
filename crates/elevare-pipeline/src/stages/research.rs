use crate::prompts;
use crate::render::render_outline;
use crate::schema;
use crate::stage::{Stage, StageContext, StageOutput};
use crate::stages::text_output;
use async_trait::async_trait;
use elevare_capabilities::{Researcher, StructuredExtractor, TextGenerator};
use elevare_core::{EventType, PipelineEvent, StageFailure};
use elevare_session::{ResearchOutline, StateKey};
use serde_json::{json, Value};
use std::sync::Arc;

/// Deep research on the topic. One call yields the report and its by-products.
pub struct ResearchStage {
    researcher: Arc<dyn Researcher>,
}

impl ResearchStage {
    pub fn new(researcher: Arc<dyn Researcher>) -> Self {
        Self { researcher }
    }
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> &'static str {
        "research"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[
            StateKey::ResearchReport,
            StateKey::ResearchContext,
            StateKey::ResearchSources,
            StateKey::ResearchImages,
        ]
    }

    // Sources and images may legitimately be empty.
    fn cache_keys(&self) -> &'static [StateKey] {
        &[StateKey::ResearchReport]
    }

    fn emits(&self) -> &'static [EventType] {
        &[
            EventType::ResearchReport,
            EventType::ResearchContext,
            EventType::ResearchSources,
            EventType::ResearchImages,
        ]
    }

    fn long_running(&self) -> bool {
        true
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let bundle = self.researcher.research(ctx.require_topic()?).await?;
        Ok(StageOutput::new()
            .with(StateKey::ResearchReport, bundle.report)
            .with(StateKey::ResearchContext, bundle.context)
            .with(StateKey::ResearchSources, bundle.sources)
            .with(StateKey::ResearchImages, bundle.images))
    }

    fn events(&self, output: &StageOutput) -> Vec<PipelineEvent> {
        vec![
            PipelineEvent::new(
                EventType::ResearchReport,
                output.value_or(StateKey::ResearchReport, json!("")),
            ),
            PipelineEvent::new(
                EventType::ResearchContext,
                output.value_or(StateKey::ResearchContext, json!("")),
            ),
            PipelineEvent::new(
                EventType::ResearchSources,
                output.value_or(StateKey::ResearchSources, json!([])),
            ),
            PipelineEvent::new(
                EventType::ResearchImages,
                output.value_or(StateKey::ResearchImages, json!([])),
            ),
        ]
    }
}

/// Short spoken summary of the research report.
pub struct ReportSummaryStage {
    generator: Arc<dyn TextGenerator>,
}

impl ReportSummaryStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for ReportSummaryStage {
    fn name(&self) -> &'static str {
        "report_summary"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::ResearchSummary]
    }

    fn emits(&self) -> &'static [EventType] {
        &[EventType::AudioTranscript]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let report = ctx.require_text(StateKey::ResearchReport)?;
        let prompt = prompts::report_summary(ctx.require_topic()?, &report);
        let summary = self.generator.generate(&prompt).await?;
        Ok(StageOutput::new().with(StateKey::ResearchSummary, text_output(summary)?))
    }

    fn events(&self, output: &StageOutput) -> Vec<PipelineEvent> {
        vec![PipelineEvent::new(
            EventType::AudioTranscript,
            output.value_or(StateKey::ResearchSummary, json!("")),
        )]
    }
}

/// Structured outline of the report, drawn on the whiteboard.
pub struct ReportOutlineStage {
    extractor: Arc<dyn StructuredExtractor>,
}

impl ReportOutlineStage {
    pub fn new(extractor: Arc<dyn StructuredExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Stage for ReportOutlineStage {
    fn name(&self) -> &'static str {
        "report_outline"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::ResearchOutline]
    }

    fn emits(&self) -> &'static [EventType] {
        &[EventType::WhiteboardReset, EventType::WhiteboardUpdate]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let report = ctx.require_text(StateKey::ResearchReport)?;
        let outline = self
            .extractor
            .extract(&report, &schema::research_outline())
            .await?;
        Ok(StageOutput::new().with(StateKey::ResearchOutline, outline))
    }

    fn events(&self, output: &StageOutput) -> Vec<PipelineEvent> {
        let items = output
            .get(StateKey::ResearchOutline)
            .and_then(|value| serde_json::from_value::<ResearchOutline>(value.clone()).ok())
            .map(|outline| render_outline(&outline))
            .and_then(|items| serde_json::to_value(items).ok())
            .unwrap_or_else(|| Value::Array(Vec::new()));
        vec![
            PipelineEvent::new(EventType::WhiteboardReset, json!({})),
            PipelineEvent::new(EventType::WhiteboardUpdate, items),
        ]
    }
}

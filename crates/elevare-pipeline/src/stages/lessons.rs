use crate::prompts;
use crate::schema;
use crate::stage::{Stage, StageContext, StageOutput};
use crate::stages::text_output;
use async_trait::async_trait;
use elevare_capabilities::{StructuredExtractor, TextGenerator};
use elevare_core::{EventType, PipelineEvent, StageFailure};
use elevare_session::StateKey;
use serde_json::json;
use std::sync::Arc;

/// Markdown lesson plan. Grounded in the research report when it covers the same topic.
pub struct LessonPlanStage {
    generator: Arc<dyn TextGenerator>,
}

impl LessonPlanStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for LessonPlanStage {
    fn name(&self) -> &'static str {
        "lesson_plan"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::LessonPlan]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let topic = ctx.require_topic()?;
        let research = &ctx.state.research;
        let report = research
            .report
            .as_deref()
            .filter(|_| {
                research
                    .topic
                    .as_deref()
                    .is_some_and(|t| t.trim().eq_ignore_ascii_case(topic.trim()))
            })
            .filter(|r| !r.trim().is_empty());
        let plan = self
            .generator
            .generate(&prompts::lesson_plan(topic, report))
            .await?;
        Ok(StageOutput::new().with(StateKey::LessonPlan, text_output(plan)?))
    }
}

/// Spoken walkthrough of the lesson plan.
pub struct LessonWalkthroughStage {
    generator: Arc<dyn TextGenerator>,
}

impl LessonWalkthroughStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for LessonWalkthroughStage {
    fn name(&self) -> &'static str {
        "lesson_walkthrough"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::LessonWalkthrough]
    }

    fn emits(&self) -> &'static [EventType] {
        &[EventType::AudioTranscript]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let plan = ctx.require_text(StateKey::LessonPlan)?;
        let prompt = prompts::lesson_walkthrough(ctx.require_topic()?, &plan);
        let walkthrough = self.generator.generate(&prompt).await?;
        Ok(StageOutput::new().with(StateKey::LessonWalkthrough, text_output(walkthrough)?))
    }

    fn events(&self, output: &StageOutput) -> Vec<PipelineEvent> {
        vec![PipelineEvent::new(
            EventType::AudioTranscript,
            output.value_or(StateKey::LessonWalkthrough, json!("")),
        )]
    }
}

/// Study guide extracted from the lesson plan.
pub struct StudyGuideStage {
    extractor: Arc<dyn StructuredExtractor>,
}

impl StudyGuideStage {
    pub fn new(extractor: Arc<dyn StructuredExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Stage for StudyGuideStage {
    fn name(&self) -> &'static str {
        "study_guide"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::StudyGuide]
    }

    fn emits(&self) -> &'static [EventType] {
        &[EventType::StudyGuide]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let plan = ctx.require_text(StateKey::LessonPlan)?;
        let guide = self.extractor.extract(&plan, &schema::study_guide()).await?;
        Ok(StageOutput::new().with(StateKey::StudyGuide, guide))
    }

    fn events(&self, output: &StageOutput) -> Vec<PipelineEvent> {
        vec![PipelineEvent::new(
            EventType::StudyGuide,
            output.value_or(StateKey::StudyGuide, json!({})),
        )]
    }
}

use crate::stage::Stage;
use crate::stages::{
    ConfirmationStage, LessonPlanStage, LessonWalkthroughStage, ReportOutlineStage,
    ReportSummaryStage, ResearchStage, StudyGuideStage,
};
use crate::types::PipelineKind;
use elevare_capabilities::Capabilities;
use elevare_core::EventType;
use elevare_session::{Namespace, StateKey};

/// An ordered list of stages bound to one set of capabilities.
pub struct Pipeline {
    kind: PipelineKind,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn build(kind: PipelineKind, caps: &Capabilities) -> Self {
        let stages: Vec<Box<dyn Stage>> = match kind {
            PipelineKind::Entry => vec![Box::new(ConfirmationStage::new(caps.generator.clone()))],
            PipelineKind::ResearchTopic => vec![
                Box::new(ResearchStage::new(caps.researcher.clone())),
                Box::new(ReportSummaryStage::new(caps.generator.clone())),
                Box::new(ReportOutlineStage::new(caps.extractor.clone())),
            ],
            PipelineKind::PlanLessons => vec![
                Box::new(LessonPlanStage::new(caps.generator.clone())),
                Box::new(LessonWalkthroughStage::new(caps.generator.clone())),
                Box::new(StudyGuideStage::new(caps.extractor.clone())),
            ],
        };
        Self::with_stages(kind, stages)
    }

    /// A pipeline of `kind` running custom stages.
    pub fn with_stages(kind: PipelineKind, stages: Vec<Box<dyn Stage>>) -> Self {
        Self { kind, stages }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// The namespace whose memoized results belong to the run's topic.
    pub fn namespace(&self) -> Option<Namespace> {
        match self.kind {
            PipelineKind::Entry => None,
            PipelineKind::ResearchTopic => Some(Namespace::Research),
            PipelineKind::PlanLessons => Some(Namespace::Lessons),
        }
    }

    pub(crate) fn topic_key(&self) -> Option<StateKey> {
        match self.namespace()? {
            Namespace::Research => Some(StateKey::ResearchTopic),
            Namespace::Lessons => Some(StateKey::LessonsTopic),
            Namespace::Session => Some(StateKey::SessionTopic),
        }
    }

    /// Every event a successful run emits, in order.
    pub fn schedule(&self) -> Vec<EventType> {
        self.stages
            .iter()
            .flat_map(|stage| stage.emits().iter().copied())
            .chain(std::iter::once(EventType::PipelineCompleted))
            .collect()
    }
}

use crate::prompts;
use crate::stage::{Stage, StageContext, StageOutput};
use crate::stages::text_output;
use async_trait::async_trait;
use elevare_capabilities::TextGenerator;
use elevare_core::StageFailure;
use elevare_session::StateKey;
use std::sync::Arc;

/// Generates the greeting returned when a session is created.
pub struct ConfirmationStage {
    generator: Arc<dyn TextGenerator>,
}

impl ConfirmationStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for ConfirmationStage {
    fn name(&self) -> &'static str {
        "confirmation"
    }

    fn outputs(&self) -> &'static [StateKey] {
        &[StateKey::ConfirmationMessage]
    }

    async fn compute(&self, ctx: &StageContext) -> Result<StageOutput, StageFailure> {
        let prompt = prompts::confirmation(ctx.topic.as_deref());
        let message = self.generator.generate(&prompt).await?;
        Ok(StageOutput::new().with(StateKey::ConfirmationMessage, text_output(message)?))
    }
}

use elevare_core::{ElevareError, ElevareResult, PipelineEvent};
use elevare_pipeline::{PipelineEngine, PipelineInput, PipelineKind, RunStatus};
use elevare_session::SessionHandle;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const INVALID_JSON: &str = "Invalid JSON format";
const MISSING_TYPE: &str = "Message must include a string \"type\" field";

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Run {
        pipeline: PipelineKind,
        input: PipelineInput,
    },
    EndSession,
    /// Valid JSON with a `type` no pipeline answers to.
    Unknown(Value),
}

impl InboundMessage {
    /// Parses a text frame. The `type` field is case-insensitive.
    pub fn parse(text: &str) -> ElevareResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|_| ElevareError::Parse(INVALID_JSON.into()))?;
        let Some(command) = value.get("type").and_then(Value::as_str) else {
            return Err(ElevareError::Parse(MISSING_TYPE.into()));
        };
        let command = command.trim().to_uppercase();

        if command == "END_SESSION" {
            return Ok(InboundMessage::EndSession);
        }
        match PipelineKind::from_command(&command) {
            Some(pipeline) => Ok(InboundMessage::Run {
                pipeline,
                input: PipelineInput {
                    topic: value
                        .get("topic")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                },
            }),
            None => Ok(InboundMessage::Unknown(value)),
        }
    }
}

/// Frames queued for the socket writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// A `{"type": ..., "message": ...}` frame that is not a pipeline event.
#[derive(Debug)]
pub struct OutboundMessage {
    pub msg_type: String,
    pub message: Value,
}

impl OutboundMessage {
    pub fn new(msg_type: &str, message: Value) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            message,
        }
    }

    fn into_text(self) -> String {
        json!({"type": self.msg_type, "message": self.message}).to_string()
    }
}

fn error_reply(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Whether the connection should keep reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Turns inbound commands into pipeline runs and outbound frames.
pub struct MessageRouter {
    engine: Arc<PipelineEngine>,
}

impl MessageRouter {
    pub fn new(engine: Arc<PipelineEngine>) -> Self {
        Self { engine }
    }

    pub async fn handle_message(
        &self,
        text: &str,
        session: &Arc<SessionHandle>,
        cancel: &CancellationToken,
        out: &mpsc::Sender<Outbound>,
    ) -> Flow {
        let session_id = session.id();
        let inbound = match InboundMessage::parse(text) {
            Ok(inbound) => inbound,
            Err(ElevareError::Parse(reason)) => {
                warn!(session_id = %session_id, %reason, "Rejected inbound message");
                return send(out, error_reply(&reason)).await;
            }
            Err(e) => return send(out, error_reply(&e.to_string())).await,
        };

        match inbound {
            InboundMessage::Run { pipeline, input } => {
                info!(session_id = %session_id, pipeline = %pipeline, "Routing command to pipeline");
                self.run_pipeline(pipeline, input, session, cancel, out).await
            }
            InboundMessage::EndSession => {
                info!(session_id = %session_id, "Client ended session");
                // A failed checkpoint leaves the session dirty for the background flush.
                let _ = self.engine.store().persist_handle(session).await;
                let ended = OutboundMessage::new("SESSION_ENDED", json!({ "session_id": session_id }));
                send(out, ended.into_text()).await;
                Flow::Close
            }
            InboundMessage::Unknown(value) => {
                let echo = OutboundMessage::new("ECHO", json!(format!("Received: {value}")));
                send(out, echo.into_text()).await
            }
        }
    }

    async fn run_pipeline(
        &self,
        pipeline: PipelineKind,
        input: PipelineInput,
        session: &Arc<SessionHandle>,
        cancel: &CancellationToken,
        out: &mpsc::Sender<Outbound>,
    ) -> Flow {
        let mut run = self
            .engine
            .start(pipeline, Arc::clone(session), input, cancel.clone());

        while let Some(event) = run.events.recv().await {
            if forward(out, &event).await == Flow::Close {
                // Writer is gone; stop paying for the rest of the run.
                cancel.cancel();
            }
        }

        let outcome = match run.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session_id = %session.id(), error = %e, "Pipeline task crashed");
                let fault = OutboundMessage::new("ERROR", json!({ "error": "internal error" }));
                send(out, fault.into_text()).await;
                return Flow::Close;
            }
        };

        match outcome.status {
            RunStatus::Failed { stage, error } => {
                let failure = OutboundMessage::new("ERROR", json!({ "stage": stage, "error": error }));
                send(out, failure.into_text()).await
            }
            RunStatus::Rejected { reason } => {
                let rejected = OutboundMessage::new("ERROR", json!({ "error": reason }));
                send(out, rejected.into_text()).await
            }
            RunStatus::Cancelled => Flow::Close,
            _ => Flow::Continue,
        }
    }
}

async fn forward(out: &mpsc::Sender<Outbound>, event: &PipelineEvent) -> Flow {
    match event.to_json() {
        Ok(text) => send(out, text).await,
        Err(e) => {
            error!(event = %event.event_type, error = %e, "Failed to serialize event");
            Flow::Continue
        }
    }
}

async fn send(out: &mpsc::Sender<Outbound>, text: String) -> Flow {
    match out.send(Outbound::Text(text)).await {
        Ok(()) => Flow::Continue,
        Err(_) => Flow::Close,
    }
}

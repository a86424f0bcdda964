use crate::connection::ConnectionManager;
use crate::lifecycle::{CreateSessionRequest, SessionLifecycle};
use crate::router::{Flow, MessageRouter, Outbound};
use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use elevare_core::{CapabilityError, ElevareError, StageFailure};
use elevare_pipeline::{retry_once, PipelineEngine};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const OUTBOUND_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 16;

/// Shared application state.
pub struct AppState {
    pub engine: Arc<PipelineEngine>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub router: Arc<MessageRouter>,
    pub connections: Arc<ConnectionManager>,
}

/// The HTTP and WebSocket front of the pipeline engine.
pub struct GatewayServer;

impl GatewayServer {
    pub fn build(engine: Arc<PipelineEngine>) -> Router {
        let state = Arc::new(AppState {
            lifecycle: Arc::new(SessionLifecycle::new(Arc::clone(&engine))),
            router: Arc::new(MessageRouter::new(Arc::clone(&engine))),
            connections: ConnectionManager::new(),
            engine,
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/session", post(create_session_handler))
            .route("/session/{session_id}", get(ws_handler))
            .route("/generate-audio", post(generate_audio_handler))
            .with_state(state)
    }
}

/// An error rendered as `{"error": ...}` with a status derived from its kind.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl From<ElevareError> for ApiError {
    fn from(err: ElevareError) -> Self {
        let status = match &err {
            ElevareError::Parse(_) | ElevareError::Validation(_) | ElevareError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            ElevareError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ElevareError::SessionNotReady(_) => StatusCode::CONFLICT,
            ElevareError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            ElevareError::Stage(_) | ElevareError::Gateway(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "elevare"}))
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))?
    };
    let created = state.lifecycle.create(request).await?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
struct AudioRequest {
    text: String,
}

async fn generate_audio_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AudioRequest>,
) -> Result<Response, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "text must not be empty".into()));
    }

    let synthesizer = Arc::clone(&state.engine.capabilities().synthesizer);
    let audio = retry_once("synthesis", |_| {
        let synthesizer = Arc::clone(&synthesizer);
        async move {
            let bytes = synthesizer.synthesize(text).await?;
            if bytes.is_empty() {
                return Err(StageFailure::from(CapabilityError::Synthesis(
                    "no audio returned".into(),
                )));
            }
            Ok(bytes)
        }
    })
    .await
    .map_err(|e| ApiError(StatusCode::BAD_GATEWAY, e.to_string()))?;

    info!(bytes = audio.len(), "Audio generated");
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn reject(mut socket: WebSocket, err: &ElevareError) {
    let code = match err {
        ElevareError::Persistence(_) => close_code::ERROR,
        _ => close_code::POLICY,
    };
    warn!(error = %err, code, "WebSocket connection rejected");
    let frame = CloseFrame {
        code,
        reason: err.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, raw_id: String) {
    let session = match state.lifecycle.admit(&raw_id).await {
        Ok(session) => session,
        Err(e) => return reject(socket, &e).await,
    };
    let conn = state.connections.add(session.id()).await;
    info!(session_id = %conn.session_id, connection_id = %conn.id, "WebSocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(COMMAND_BUFFER);

    // Task: outbound queue to socket
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Task: socket to command queue
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if cmd_tx.send(text.to_string()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Task: commands, strictly one after another
    let router = Arc::clone(&state.router);
    let worker_session = Arc::clone(&session);
    let cancel = conn.cancel.clone();
    let mut worker = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(text) => text,
                    None => break,
                },
            };
            if router
                .handle_message(&text, &worker_session, &cancel, &out_tx)
                .await
                == Flow::Close
            {
                break;
            }
        }
        let _ = out_tx.send(Outbound::Close).await;
    });

    tokio::select! {
        _ = &mut reader => {
            conn.cancel.cancel();
            if let Err(e) = (&mut worker).await {
                error!(session_id = %conn.session_id, error = %e, "Connection worker crashed");
            }
        }
        result = &mut worker => {
            if let Err(e) = result {
                error!(session_id = %conn.session_id, error = %e, "Connection worker crashed");
            }
            reader.abort();
        }
    }
    let _ = writer.await;

    state.connections.remove(&conn).await;
    info!(session_id = %conn.session_id, connection_id = %conn.id, "WebSocket disconnected");
    state.lifecycle.teardown(session).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use elevare_capabilities::Capabilities;
    use elevare_pipeline::EngineConfig;
    use elevare_session::{MemorySessionStore, StateStore};
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(StateStore::new(Arc::new(MemorySessionStore::new())));
        let engine = Arc::new(PipelineEngine::new(
            store,
            Capabilities::offline(),
            EngineConfig::default(),
        ));
        GatewayServer::build(engine)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn create_session_accepts_an_empty_body() {
        let response = app()
            .oneshot(Request::post("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["session_id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body["confirmation"].as_str().is_some_and(|c| !c.is_empty()));
    }

    #[tokio::test]
    async fn create_session_rejects_bad_ids_and_bodies() {
        let bad_id = Request::post("/session")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"session_id":"no spaces please"}"#))
            .unwrap();
        let response = app().oneshot(bad_id).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let garbage = Request::post("/session").body(Body::from("{oops")).unwrap();
        let response = app().oneshot(garbage).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn generate_audio_rejects_blank_text() {
        let request = Request::post("/generate-audio")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"   "}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_audio_returns_mpeg() {
        let request = Request::post("/generate-audio")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"Hello there"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"ID3"));
    }
}

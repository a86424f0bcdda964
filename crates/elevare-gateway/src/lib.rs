//! HTTP and WebSocket gateway for Elevare.
//!
//! `POST /session` creates a session and runs its entry pipeline,
//! `GET /session/{id}` upgrades to the duplex event channel that streams
//! pipeline events, and `POST /generate-audio` synthesizes speech.

pub mod connection;
pub mod lifecycle;
pub mod router;
pub mod server;

pub use connection::{Connection, ConnectionManager};
pub use lifecycle::{CreateSessionRequest, CreateSessionResponse, SessionLifecycle};
pub use router::{Flow, InboundMessage, MessageRouter, Outbound, OutboundMessage};
pub use server::{ApiError, AppState, GatewayServer};

//! Core types shared across the Elevare crates.
//!
//! # Main types
//!
//! - [`ElevareError`] - Unified error enum for all Elevare subsystems.
//! - [`ElevareResult`] - Convenience alias for `Result<T, ElevareError>`.
//! - [`CapabilityError`] - Failure of one of the external capabilities
//!   (generation, synthesis, research, extraction).
//! - [`StageError`] - A pipeline stage that failed, with its cause.
//! - [`SessionId`] - Opaque, validated session identifier.
//! - [`PipelineEvent`] / [`EventType`] - Typed events streamed to clients.

pub mod error;
pub mod event;
pub mod id;

pub use error::{CapabilityError, ElevareError, ElevareResult, StageError, StageFailure};
pub use event::{EventType, PipelineEvent};
pub use id::SessionId;

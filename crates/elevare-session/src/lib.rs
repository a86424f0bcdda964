//! Typed, durable per-session state.
//!
//! [`SessionState`] is an explicit schema addressed by [`StateKey`] paths.
//! [`StateStore`] serves it from memory with per-session locking and
//! checkpoints it to a [`SessionStore`] backend.

pub mod handle;
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod state;
pub mod store;

pub use handle::{SessionHandle, StateStore};
pub use schema::{Conclusion, Introduction, OutlineContent, ResearchOutline, StudyGuide};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
pub use state::{
    is_populated, LessonsState, Namespace, ResearchState, SessionInfo, SessionState, StateKey,
};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use crate::state::SessionState;
use crate::store::{persistence, SessionStore};
use async_trait::async_trait;
use elevare_core::{ElevareResult, SessionId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id         TEXT PRIMARY KEY,
    state      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// SQLite-backed session store. One row per session, state stored as JSON text.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>) -> ElevareResult<Self> {
        let conn = Connection::open(path).map_err(|e| persistence("open sqlite", e))?;
        Self::init(conn)
    }

    pub fn in_memory() -> ElevareResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| persistence("open sqlite", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ElevareResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| persistence("migrate sqlite", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, context: &'static str, f: F) -> ElevareResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| persistence(context, e))?
        .map_err(|e| persistence(context, e))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, id: &SessionId, state: &SessionState) -> ElevareResult<()> {
        let json = serde_json::to_string(state)?;
        let id = id.to_string();
        let updated_at = state.updated_at.to_rfc3339();
        self.with_conn("save session", move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                params![id, json, updated_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn load(&self, id: &SessionId) -> ElevareResult<Option<SessionState>> {
        let key = id.to_string();
        let row: Option<String> = self
            .with_conn("load session", move |conn| {
                conn.query_row(
                    "SELECT state FROM sessions WHERE id = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;
        match row {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(|e| persistence("parse session", e))?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &SessionId) -> ElevareResult<()> {
        let key = id.to_string();
        self.with_conn("delete session", move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![key])
                .map(|_| ())
        })
        .await
    }

    async fn list(&self) -> ElevareResult<Vec<SessionId>> {
        let raw: Vec<String> = self
            .with_conn("list sessions", |conn| {
                let mut stmt = conn.prepare("SELECT id FROM sessions ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect()
            })
            .await?;
        Ok(raw
            .iter()
            .filter_map(|id| SessionId::parse(id).ok())
            .collect())
    }
}

use elevare_core::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// The live connection bound to a session.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub session_id: SessionId,
    /// Cancelled when the connection closes or is superseded.
    pub cancel: CancellationToken,
}

/// Tracks at most one live connection per session.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<SessionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new connection for `session_id`, cancelling the one it replaces.
    pub async fn add(&self, session_id: &SessionId) -> Connection {
        let conn = Connection {
            id: Uuid::new_v4(),
            session_id: session_id.clone(),
            cancel: CancellationToken::new(),
        };
        let previous = self
            .connections
            .write()
            .await
            .insert(session_id.clone(), conn.clone());
        if let Some(previous) = previous {
            info!(
                session_id = %session_id,
                connection_id = %previous.id,
                "Connection superseded"
            );
            previous.cancel.cancel();
        }
        info!(session_id = %session_id, connection_id = %conn.id, "Connection added");
        conn
    }

    /// Removes `conn` unless a newer connection already took its place.
    pub async fn remove(&self, conn: &Connection) {
        let mut connections = self.connections.write().await;
        if connections
            .get(&conn.session_id)
            .is_some_and(|current| current.id == conn.id)
        {
            connections.remove(&conn.session_id);
        }
        conn.cancel.cancel();
        info!(session_id = %conn.session_id, connection_id = %conn.id, "Connection removed");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_connection_supersedes_old_one() {
        let manager = ConnectionManager::new();
        let id = SessionId::generate();

        let first = manager.add(&id).await;
        let second = manager.add(&id).await;
        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert_eq!(manager.connection_count().await, 1);

        // The superseded connection must not evict its successor.
        manager.remove(&first).await;
        assert_eq!(manager.connection_count().await, 1);

        manager.remove(&second).await;
        assert_eq!(manager.connection_count().await, 0);
    }
}

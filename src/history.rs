//! Per-session conversation history
//!
//! Only user inputs and final assistant outputs are stored. Tool traffic
//! belongs to a single run and is never persisted.

use crate::llm::{ChatMessage, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id);
";

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("History lock poisoned")]
    Poisoned,
    #[error("Unknown role in history: {0}")]
    InvalidRole(String),
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// One stored message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryMessage {
    pub fn into_chat_message(self) -> ChatMessage {
        match self.role {
            Role::System => ChatMessage::system(self.content),
            Role::User => ChatMessage::user(self.content),
            Role::Assistant | Role::Tool => ChatMessage::assistant(self.content),
        }
    }
}

/// Storage for session messages
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, session_id: &str, role: Role, content: &str) -> HistoryResult<()>;

    /// Messages of a session, oldest first
    async fn list(&self, session_id: &str) -> HistoryResult<Vec<HistoryMessage>>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Open the database at `path`, falling back to memory when that fails
pub fn open_or_fallback(path: &Path) -> Arc<dyn HistoryStore> {
    match SqliteHistory::open(path) {
        Ok(store) => {
            tracing::info!(path = %path.display(), "Opened history database");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not open history database, keeping history in memory"
            );
            Arc::new(InMemoryHistory::default())
        }
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Thread-safe `SQLite` history handle
#[derive(Clone)]
pub struct SqliteHistory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> HistoryResult<Self> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> HistoryResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> HistoryResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> HistoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| HistoryError::Poisoned)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn append(&self, session_id: &str, role: Role, content: &str) -> HistoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role.as_str(), content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn list(&self, session_id: &str) -> HistoryResult<Vec<HistoryMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, role, content, created_at FROM messages
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (session_id, role, content, created_at) = row?;
            let role = role.parse::<Role>().map_err(|_| HistoryError::InvalidRole(role))?;
            messages.push(HistoryMessage {
                session_id,
                role,
                content,
                created_at: parse_datetime(&created_at),
            });
        }
        Ok(messages)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-lifetime history, used when no database is available
#[derive(Default)]
pub struct InMemoryHistory {
    sessions: Mutex<HashMap<String, Vec<HistoryMessage>>>,
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, session_id: &str, role: Role, content: &str) -> HistoryResult<()> {
        let mut sessions = self.sessions.lock().map_err(|_| HistoryError::Poisoned)?;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(HistoryMessage {
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn list(&self, session_id: &str) -> HistoryResult<Vec<HistoryMessage>> {
        let sessions = self.sessions.lock().map_err(|_| HistoryError::Poisoned)?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

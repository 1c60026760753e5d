//! Scrivener Storage Layer
//!
//! Implements the `SessionStore` trait on SQLite.
//!
//! # Architecture
//!
//! - `sessions`: one row per research run, updated in place as stages complete
//! - `artifacts`: append-only stage outputs as JSON, unique per `(session, kind, name)`
//! - `transcript`: append-only human-readable log of the run
//!
//! # Examples
//!
//! ```no_run
//! use scrivener_store::SqliteSessionStore;
//!
//! let store = SqliteSessionStore::new("scrivener.db").unwrap();
//! // Store is now ready for session operations
//! ```

#![warn(missing_docs)]

use rusqlite::{params, Connection, OptionalExtension};
use scrivener_domain::traits::SessionStore;
use scrivener_domain::{
    unix_now, Artifact, ArtifactKey, Session, SessionId, SessionStatus, Stage, StoredArtifact,
    TranscriptEntry,
};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Artifact key already written for the session
    #[error("Duplicate artifact: {0}")]
    Duplicate(ArtifactKey),

    /// Session id already exists
    #[error("Session already exists: {0}")]
    SessionExists(SessionId),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// SQLite-based implementation of `SessionStore`
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store between tasks
/// behind a mutex, or give each thread its own instance.
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory store
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn session_exists(&self, id: SessionId) -> Result<bool, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false))
    }

    fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            topic: row.get(1)?,
            current_stage: row.get(2)?,
            status: row.get(3)?,
            revision_count: row.get(4)?,
            error: row.get(5)?,
            config: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// Raw session columns before domain conversion
struct SessionRow {
    id: String,
    topic: String,
    current_stage: String,
    status: String,
    revision_count: i64,
    error: Option<String>,
    config: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: SessionId::from_string(&row.id).map_err(StoreError::InvalidData)?,
            topic: row.topic,
            current_stage: Stage::parse(&row.current_stage).ok_or_else(|| {
                StoreError::InvalidData(format!("Unknown stage: {}", row.current_stage))
            })?,
            status: SessionStatus::parse(&row.status).ok_or_else(|| {
                StoreError::InvalidData(format!("Unknown status: {}", row.status))
            })?,
            revision_count: row.revision_count as u32,
            error: row.error,
            config: row.config,
            created_at: row.created_at as u64,
            updated_at: row.updated_at as u64,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, topic, current_stage, status, revision_count, error, config, created_at, updated_at";

impl SessionStore for SqliteSessionStore {
    type Error = StoreError;

    fn create_session(&mut self, session: &Session) -> Result<(), Self::Error> {
        if self.session_exists(session.id)? {
            return Err(StoreError::SessionExists(session.id));
        }
        self.conn.execute(
            "INSERT INTO sessions (id, topic, current_stage, status, revision_count, error, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.id.to_string(),
                &session.topic,
                session.current_stage.to_string(),
                session.status.as_str(),
                session.revision_count as i64,
                &session.error,
                &session.config,
                session.created_at as i64,
                session.updated_at as i64,
            ],
        )?;
        debug!("Created session {}", session.id);
        Ok(())
    }

    fn update_session(&mut self, session: &Session) -> Result<(), Self::Error> {
        let updated = self.conn.execute(
            "UPDATE sessions
             SET current_stage = ?2, status = ?3, revision_count = ?4, error = ?5, config = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                session.id.to_string(),
                session.current_stage.to_string(),
                session.status.as_str(),
                session.revision_count as i64,
                &session.error,
                &session.config,
                session.updated_at as i64,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(session.id.to_string()));
        }
        Ok(())
    }

    fn get_session(&self, id: SessionId) -> Result<Option<Session>, Self::Error> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![id.to_string()],
                Self::row_to_session,
            )
            .optional()?;
        row.map(Session::try_from).transpose()
    }

    fn list_sessions(&self) -> Result<Vec<Session>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(Session::try_from(row?)?);
        }
        Ok(sessions)
    }

    fn append_artifact(&mut self, id: SessionId, artifact: &Artifact) -> Result<u64, Self::Error> {
        if !self.session_exists(id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let key = artifact.key();
        let payload = serde_json::to_string(artifact)?;
        let tx = self.conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM artifacts WHERE session_id = ?1 AND kind = ?2 AND name = ?3",
                params![id.to_string(), key.kind.as_str(), &key.name],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(StoreError::Duplicate(key));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM artifacts WHERE session_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO artifacts (session_id, seq, kind, name, stage, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                seq,
                key.kind.as_str(),
                &key.name,
                artifact.stage().to_string(),
                payload,
                unix_now() as i64,
            ],
        )?;
        tx.commit()?;

        debug!("Session {}: appended artifact {} (seq {})", id, key, seq);
        Ok(seq as u64)
    }

    fn load_artifacts(&self, id: SessionId) -> Result<Vec<StoredArtifact>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, payload, created_at FROM artifacts WHERE session_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut artifacts = Vec::new();
        for row in rows {
            let (seq, payload, created_at) = row?;
            let artifact: Artifact = serde_json::from_str(&payload).map_err(|e| {
                StoreError::InvalidData(format!("artifact seq {} of {}: {}", seq, id, e))
            })?;
            artifacts.push(StoredArtifact {
                seq: seq as u64,
                artifact,
                created_at: created_at as u64,
            });
        }
        Ok(artifacts)
    }

    fn append_transcript(
        &mut self,
        id: SessionId,
        stage: &str,
        message: &str,
    ) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO transcript (session_id, stage, message, logged_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), stage, message, unix_now() as i64],
        )?;
        Ok(())
    }

    fn load_transcript(&self, id: SessionId) -> Result<Vec<TranscriptEntry>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, message, logged_at FROM transcript WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok(TranscriptEntry {
                stage: row.get(0)?,
                message: row.get(1)?,
                logged_at: row.get::<_, i64>(2)? as u64,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }
}

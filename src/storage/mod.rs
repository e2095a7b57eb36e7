use crate::error::{LoreError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub mod directory;
pub mod types;

pub use directory::SessionDirectory;
pub use types::{ChatMessage, IndexedItem, Role, Session, SessionInfo, ToolCallRecord, ToolServer};

/// Durable store for session state and the session directory
///
/// Every call opens its own connection, so the store can be shared freely
/// across tasks. Writes are single statements or explicit transactions and
/// are committed before the call returns.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        // LORE_DB points the binary at a test DB or alternate file without
        // touching the user's application data dir.
        if let Ok(override_path) = std::env::var("LORE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "lore", "lore")
            .ok_or_else(|| LoreError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| LoreError::Storage(e.to_string()))?;

        let storage = Self {
            db_path: data_dir.join("lore.db"),
        };
        storage.init()?;
        Ok(storage)
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore::storage::SqliteStorage;
    ///
    /// let dir = std::env::temp_dir().join("lore-doc-example");
    /// let storage = SqliteStorage::new_with_path(dir.join("lore.db")).unwrap();
    /// assert!(storage.path().ends_with("lore.db"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| LoreError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Open the configured database, falling back to the default location
    pub fn from_config(config: &crate::config::StorageConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        // Concurrent turns on different sessions write through separate
        // connections.
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_state (
                id TEXT PRIMARY KEY,
                state JSON NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_directory (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL
            );",
        )
        .context("Failed to create tables")
        .map_err(|e| LoreError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Read a session, creating and persisting an empty one for a fresh id
    pub fn read_session(&self, id: &str) -> Result<Session> {
        let conn = self.open()?;

        let state_json: Option<String> = conn
            .query_row(
                "SELECT state FROM session_state WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query session")
            .map_err(|e| LoreError::Storage(e.to_string()))?;

        match state_json {
            Some(json) => {
                let session: Session = serde_json::from_str(&json)
                    .context("Failed to deserialize session")
                    .map_err(|e| LoreError::Storage(e.to_string()))?;
                Ok(session)
            }
            None => {
                tracing::debug!(session_id = %id, "Creating default session state");
                let session = Session::new(id);
                // INSERT OR IGNORE: a concurrent first read must not clobber
                // a state another caller already wrote.
                conn.execute(
                    "INSERT OR IGNORE INTO session_state (id, state, updated_at) VALUES (?, ?, ?)",
                    params![id, serialize_session(&session)?, Utc::now().to_rfc3339()],
                )
                .context("Failed to insert session")
                .map_err(|e| LoreError::Storage(e.to_string()))?;
                Ok(session)
            }
        }
    }

    /// Atomically overwrite the full state of a session (last write wins)
    pub fn replace_session(&self, id: &str, state: &Session) -> Result<()> {
        if state.session_id != id {
            return Err(LoreError::Storage(format!(
                "Session id mismatch: expected {}, got {}",
                id, state.session_id
            ))
            .into());
        }

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO session_state (id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![id, serialize_session(state)?, Utc::now().to_rfc3339()],
        )
        .context("Failed to write session")
        .map_err(|e| LoreError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Empty a session's messages and index, keeping its id, model and
    /// registered tool servers
    pub fn clear_session(&self, id: &str) -> Result<Session> {
        let mut session = self.read_session(id)?;
        session.messages.clear();
        session.index.clear();
        self.replace_session(id, &session)?;
        Ok(session)
    }

    /// Load every directory entry
    pub fn load_directory(&self) -> Result<Vec<SessionInfo>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare("SELECT id, title, created_at, last_active FROM session_directory")
            .context("Failed to prepare statement")
            .map_err(|e| LoreError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let title: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                let last_active: String = row.get(3)?;
                Ok((id, title, created_at, last_active))
            })
            .context("Failed to query directory")
            .map_err(|e| LoreError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, title, created_at, last_active) = row
                .context("Failed to read directory row")
                .map_err(|e| LoreError::Storage(e.to_string()))?;
            entries.push(SessionInfo {
                id,
                title,
                created_at: parse_timestamp(&created_at),
                last_active: parse_timestamp(&last_active),
            });
        }

        Ok(entries)
    }

    /// Insert or overwrite one directory entry
    pub fn upsert_directory_entry(&self, info: &SessionInfo) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO session_directory (id, title, created_at, last_active) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                created_at = excluded.created_at,
                last_active = excluded.last_active",
            params![
                info.id,
                info.title,
                info.created_at.to_rfc3339(),
                info.last_active.to_rfc3339()
            ],
        )
        .context("Failed to write directory entry")
        .map_err(|e| LoreError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete one directory entry; returns whether a row was removed
    pub fn delete_directory_entry(&self, id: &str) -> Result<bool> {
        let conn = self.open()?;
        let removed = conn
            .execute("DELETE FROM session_directory WHERE id = ?", params![id])
            .context("Failed to delete directory entry")
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        Ok(removed > 0)
    }

    /// Delete every directory entry; returns the number removed
    pub fn clear_directory(&self) -> Result<usize> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        let removed = tx
            .execute("DELETE FROM session_directory", [])
            .context("Failed to clear directory")
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| LoreError::Storage(e.to_string()))?;
        Ok(removed)
    }
}

fn serialize_session(session: &Session) -> Result<String> {
    serde_json::to_string(session)
        .context("Failed to serialize session")
        .map_err(|e| LoreError::Storage(e.to_string()).into())
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!("Unparseable timestamp in session directory: {}", value);
            Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    /// Helper: create a temporary storage instance backed by a temp directory.
    ///
    /// Returns both the `SqliteStorage` and the `TempDir` so the caller keeps
    /// ownership of the directory (preventing it from being removed).
    fn create_test_storage() -> (SqliteStorage, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let storage =
            SqliteStorage::new_with_path(dir.path().join("lore.db")).expect("failed to create storage");
        (storage, dir)
    }

    #[test]
    fn test_init_creates_tables() {
        let (storage, _dir) = create_test_storage();
        let conn = Connection::open(storage.path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('session_state', 'session_directory')",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_read_creates_default_session() {
        let (storage, _dir) = create_test_storage();

        let session = storage.read_session("fresh").expect("read failed");
        assert_eq!(session.session_id, "fresh");
        assert!(session.messages.is_empty());
        assert!(!session.is_processing);

        // Persisted on first read
        let conn = Connection::open(storage.path()).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM session_state WHERE id = 'fresh'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_replace_overwrites_full_state() {
        let (storage, _dir) = create_test_storage();
        let mut session = storage.read_session("s1").unwrap();
        session.messages.push(ChatMessage::user("hello"));
        session.is_processing = true;
        storage.replace_session("s1", &session).unwrap();

        let loaded = storage.read_session("s1").unwrap();
        assert_eq!(loaded, session);

        let mut second = Session::new("s1");
        second.model = "other-model".to_string();
        storage.replace_session("s1", &second).unwrap();
        let loaded = storage.read_session("s1").unwrap();
        assert!(loaded.messages.is_empty());
        assert_eq!(loaded.model, "other-model");
    }

    #[test]
    fn test_replace_rejects_mismatched_id() {
        let (storage, _dir) = create_test_storage();
        let session = Session::new("a");
        assert!(storage.replace_session("b", &session).is_err());
    }

    #[test]
    fn test_clear_preserves_identity_and_servers() {
        let (storage, _dir) = create_test_storage();
        let mut session = storage.read_session("s1").unwrap();
        session.messages.push(ChatMessage::user("hello"));
        session.messages.push(ChatMessage::assistant(
            "hi",
            Some(vec![ToolCallRecord {
                id: "c1".into(),
                name: "persist_finding".into(),
                arguments: json!({"title": "T", "content": "C"}),
                result: Some(json!({"success": true})),
            }]),
        ));
        session.index.push(IndexedItem::new("T", "C", None));
        session.tool_servers.push(ToolServer::new("docs", "http://localhost:3000/mcp"));
        storage.replace_session("s1", &session).unwrap();

        let cleared = storage.clear_session("s1").unwrap();
        assert!(cleared.messages.is_empty());
        assert!(cleared.index.is_empty());
        assert_eq!(cleared.session_id, "s1");
        assert_eq!(cleared.tool_servers, session.tool_servers);

        let reloaded = storage.read_session("s1").unwrap();
        assert_eq!(reloaded, cleared);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let (storage, _dir) = create_test_storage();
        let mut a = storage.read_session("a").unwrap();
        a.messages.push(ChatMessage::user("for a"));
        storage.replace_session("a", &a).unwrap();

        let b = storage.read_session("b").unwrap();
        assert!(b.messages.is_empty());
    }

    #[test]
    fn test_directory_round_trip() {
        let (storage, _dir) = create_test_storage();
        let now = Utc::now();
        let info = SessionInfo {
            id: "s1".into(),
            title: "First".into(),
            created_at: now,
            last_active: now,
        };
        storage.upsert_directory_entry(&info).unwrap();

        let entries = storage.load_directory().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "First");

        assert!(storage.delete_directory_entry("s1").unwrap());
        assert!(!storage.delete_directory_entry("s1").unwrap());
    }

    #[test]
    fn test_clear_directory_counts_rows() {
        let (storage, _dir) = create_test_storage();
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            storage
                .upsert_directory_entry(&SessionInfo {
                    id: id.into(),
                    title: id.into(),
                    created_at: now,
                    last_active: now,
                })
                .unwrap();
        }
        assert_eq!(storage.clear_directory().unwrap(), 3);
        assert!(storage.load_directory().unwrap().is_empty());
    }
}

//! Session directory: titles and recency for every known session.
//!
//! The directory is loaded from SQLite on first use and mirrored in memory.
//! Every mutation writes the affected row through to the database before
//! the in-memory mirror changes, so a returned call is always durable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use super::{SessionInfo, SqliteStorage};
use crate::error::Result;

/// Catalog of session ids with titles and recency
pub struct SessionDirectory {
    storage: Arc<SqliteStorage>,
    entries: Mutex<Option<HashMap<String, SessionInfo>>>,
}

/// Title used when a session is added without one
pub fn default_title() -> String {
    format!("Chat {}", Utc::now().format("%Y-%m-%d"))
}

/// Derive a directory title from the first message of a conversation
///
/// # Examples
///
/// ```
/// use lore::storage::directory::title_from_message;
///
/// assert_eq!(title_from_message("  short question "), "short question");
/// let long = "x".repeat(60);
/// assert_eq!(title_from_message(&long).chars().count(), 40);
/// ```
pub fn title_from_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() > 40 {
        let head: String = trimmed.chars().take(37).collect();
        format!("{}...", head)
    } else if trimmed.is_empty() {
        default_title()
    } else {
        trimmed.to_string()
    }
}

impl SessionDirectory {
    /// Create a directory over `storage`; nothing is read until first use
    pub fn new(storage: Arc<SqliteStorage>) -> Self {
        Self {
            storage,
            entries: Mutex::new(None),
        }
    }

    async fn loaded(&self) -> Result<tokio::sync::MutexGuard<'_, Option<HashMap<String, SessionInfo>>>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            let entries = self.storage.load_directory()?;
            tracing::debug!(count = entries.len(), "Loaded session directory");
            *guard = Some(entries.into_iter().map(|e| (e.id.clone(), e)).collect());
        }
        Ok(guard)
    }

    /// Add (or re-add) a session; a missing or blank title gets the default
    pub async fn add(&self, id: &str, title: Option<&str>) -> Result<SessionInfo> {
        let mut guard = self.loaded().await?;
        let now = Utc::now();
        let info = SessionInfo {
            id: id.to_string(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(default_title),
            created_at: now,
            last_active: now,
        };

        self.storage.upsert_directory_entry(&info)?;
        if let Some(entries) = guard.as_mut() {
            entries.insert(id.to_string(), info.clone());
        }
        tracing::info!(session_id = %id, title = %info.title, "Session added");
        Ok(info)
    }

    /// Remove a session; returns false when it was not present
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut guard = self.loaded().await?;
        let Some(entries) = guard.as_mut() else {
            return Ok(false);
        };
        if !entries.contains_key(id) {
            tracing::debug!(session_id = %id, "Session not in directory");
            return Ok(false);
        }

        self.storage.delete_directory_entry(id)?;
        entries.remove(id);
        tracing::info!(session_id = %id, "Session removed");
        Ok(true)
    }

    /// Mark a session as active now; unknown ids are ignored
    pub async fn touch(&self, id: &str) -> Result<()> {
        let mut guard = self.loaded().await?;
        let Some(entries) = guard.as_mut() else {
            return Ok(());
        };
        let Some(existing) = entries.get(id) else {
            tracing::debug!(session_id = %id, "touch: session not in directory");
            return Ok(());
        };

        let mut updated = existing.clone();
        updated.last_active = Utc::now();
        self.storage.upsert_directory_entry(&updated)?;
        entries.insert(id.to_string(), updated);
        Ok(())
    }

    /// Rename a session; returns false when it was not present
    pub async fn rename(&self, id: &str, title: &str) -> Result<bool> {
        let mut guard = self.loaded().await?;
        let Some(entries) = guard.as_mut() else {
            return Ok(false);
        };
        let Some(existing) = entries.get(id) else {
            return Ok(false);
        };

        let mut updated = existing.clone();
        updated.title = title.to_string();
        self.storage.upsert_directory_entry(&updated)?;
        entries.insert(id.to_string(), updated);
        tracing::info!(session_id = %id, "Session renamed");
        Ok(true)
    }

    /// All sessions, most recently active first
    pub async fn list(&self) -> Result<Vec<SessionInfo>> {
        let guard = self.loaded().await?;
        let mut list: Vec<SessionInfo> = guard
            .as_ref()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| b.last_active.cmp(&a.last_active).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// Number of known sessions
    pub async fn count(&self) -> Result<usize> {
        let guard = self.loaded().await?;
        Ok(guard.as_ref().map(HashMap::len).unwrap_or(0))
    }

    /// Look up one session
    pub async fn get(&self, id: &str) -> Result<Option<SessionInfo>> {
        let guard = self.loaded().await?;
        Ok(guard.as_ref().and_then(|entries| entries.get(id).cloned()))
    }

    /// Remove every session; returns how many were removed
    pub async fn clear_all(&self) -> Result<usize> {
        let mut guard = self.loaded().await?;
        let removed = self.storage.clear_directory()?;
        if let Some(entries) = guard.as_mut() {
            entries.clear();
        }
        tracing::info!(removed, "Session directory cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn create_directory() -> (SessionDirectory, Arc<SqliteStorage>, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let storage = Arc::new(
            SqliteStorage::new_with_path(dir.path().join("lore.db")).expect("storage"),
        );
        (SessionDirectory::new(Arc::clone(&storage)), storage, dir)
    }

    #[tokio::test]
    async fn test_add_with_default_title() {
        let (directory, _storage, _dir) = create_directory();
        let info = directory.add("s1", None).await.unwrap();
        assert!(info.title.starts_with("Chat "));
        assert_eq!(directory.count().await.unwrap(), 1);
        assert_eq!(directory.get("s1").await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn test_list_sorted_by_last_active_desc() {
        let (directory, _storage, _dir) = create_directory();
        directory.add("old", Some("Old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        directory.add("new", Some("New")).await.unwrap();

        let ids: Vec<String> = directory.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        directory.touch("old").await.unwrap();
        let ids: Vec<String> = directory.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_rename_and_remove_report_presence() {
        let (directory, _storage, _dir) = create_directory();
        directory.add("s1", Some("First")).await.unwrap();

        assert!(directory.rename("s1", "Renamed").await.unwrap());
        assert!(!directory.rename("missing", "x").await.unwrap());
        assert_eq!(directory.get("s1").await.unwrap().unwrap().title, "Renamed");

        assert!(directory.remove("s1").await.unwrap());
        assert!(!directory.remove("s1").await.unwrap());
        assert_eq!(directory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mutations_are_durable() {
        let (directory, storage, _dir) = create_directory();
        directory.add("s1", Some("First")).await.unwrap();
        directory.add("s2", Some("Second")).await.unwrap();
        directory.rename("s2", "Second renamed").await.unwrap();
        directory.remove("s1").await.unwrap();

        // A fresh directory over the same database sees every mutation
        let reopened = SessionDirectory::new(storage);
        let list = reopened.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Second renamed");
    }

    #[tokio::test]
    async fn test_clear_all_returns_count() {
        let (directory, storage, _dir) = create_directory();
        directory.add("a", None).await.unwrap();
        directory.add("b", None).await.unwrap();

        assert_eq!(directory.clear_all().await.unwrap(), 2);
        assert_eq!(directory.count().await.unwrap(), 0);
        assert!(storage.load_directory().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch_unknown_is_noop() {
        let (directory, _storage, _dir) = create_directory();
        directory.touch("ghost").await.unwrap();
        assert_eq!(directory.count().await.unwrap(), 0);
    }

    #[test]
    fn test_title_from_message() {
        assert_eq!(title_from_message("hello"), "hello");
        let title = title_from_message(&"word ".repeat(20));
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 40);
        assert!(title_from_message("   ").starts_with("Chat "));
    }
}

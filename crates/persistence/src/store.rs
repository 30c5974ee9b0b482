//! Message store
//!
//! Persists and retrieves chat turns keyed by session.
//!
//! Timestamps are stored as fixed-width RFC 3339 text so SQL ordering on
//! the column is chronological.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::StoreError;

/// Who produced a stored turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// One stored chat message; immutable after creation
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: Option<String>,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only store of chat turns
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    /// Open (or create) the SQLite database at `url` and ensure the schema.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://chronicle.db"`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests and ephemeral runs.
    ///
    /// Limited to a single pooled connection so the database outlives
    /// individual acquires.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = "sqlite::memory:".parse::<SqliteConnectOptions>()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id TEXT,
                 role TEXT NOT NULL,
                 content TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Append one turn with a server-side timestamp; returns the stored row
    pub async fn append(
        &self,
        session_id: Option<&str>,
        role: TurnRole,
        content: &str,
    ) -> Result<ChatTurn, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (session_id, role, content, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(role.to_string())
        .bind(content)
        .bind(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(ChatTurn {
            id: result.last_insert_rowid(),
            session_id: session_id.map(str::to_string),
            role,
            content: content.to_string(),
            timestamp,
        })
    }

    /// All turns sorted by timestamp ascending (id breaks ties)
    pub async fn list_all(&self) -> Result<Vec<ChatTurn>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, timestamp \
             FROM messages ORDER BY timestamp ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_turn).collect())
    }

    /// Distinct session identifiers present in the store
    pub async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT session_id FROM messages \
             WHERE session_id IS NOT NULL ORDER BY session_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Turns belonging to one session
    pub async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, session_id, role, content, timestamp \
             FROM messages WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_turn).collect())
    }
}

type MessageRow = (i64, Option<String>, String, String, String);

fn row_to_turn((id, session_id, role, content, timestamp): MessageRow) -> ChatTurn {
    ChatTurn {
        id,
        session_id,
        // Only values this store wrote are ever read back
        role: role.parse().unwrap_or(TurnRole::User),
        content,
        timestamp: timestamp
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_returns_stored_record() {
        let store = MessageStore::in_memory().await.unwrap();

        let turn = store
            .append(Some("s1"), TurnRole::User, "hello")
            .await
            .unwrap();

        assert_eq!(turn.session_id.as_deref(), Some("s1"));
        assert_eq!(turn.role, TurnRole::User);
        assert_eq!(turn.content, "hello");
        assert!(turn.id > 0);
    }

    #[tokio::test]
    async fn test_list_all_is_timestamp_ordered_across_sessions() {
        let store = MessageStore::in_memory().await.unwrap();

        // Interleave unrelated sessions
        store.append(Some("a"), TurnRole::User, "1").await.unwrap();
        store.append(Some("b"), TurnRole::User, "2").await.unwrap();
        store
            .append(Some("a"), TurnRole::Assistant, "3")
            .await
            .unwrap();
        store.append(None, TurnRole::User, "4").await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 4);
        for pair in all.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        // Equal timestamps fall back to insertion order
        let contents: Vec<&str> = all.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_list_by_session_filters_exactly() {
        let store = MessageStore::in_memory().await.unwrap();

        store.append(Some("a"), TurnRole::User, "mine").await.unwrap();
        store
            .append(Some("b"), TurnRole::User, "other")
            .await
            .unwrap();
        store.append(None, TurnRole::User, "orphan").await.unwrap();
        store
            .append(Some("a"), TurnRole::Assistant, "mine too")
            .await
            .unwrap();

        let turns = store.list_by_session("a").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns
            .iter()
            .all(|t| t.session_id.as_deref() == Some("a")));
    }

    #[tokio::test]
    async fn test_list_sessions_is_distinct_and_skips_null() {
        let store = MessageStore::in_memory().await.unwrap();

        store.append(Some("a"), TurnRole::User, "1").await.unwrap();
        store.append(Some("a"), TurnRole::Assistant, "2").await.unwrap();
        store.append(Some("b"), TurnRole::User, "3").await.unwrap();
        store.append(None, TurnRole::User, "4").await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions, vec!["a", "b"]);
    }

    #[test]
    fn test_role_round_trips_through_text() {
        assert_eq!("user".parse::<TurnRole>().unwrap(), TurnRole::User);
        assert_eq!(
            "assistant".parse::<TurnRole>().unwrap(),
            TurnRole::Assistant
        );
        assert_eq!(TurnRole::Assistant.to_string(), "assistant");
        assert!("narrator".parse::<TurnRole>().is_err());
    }
}

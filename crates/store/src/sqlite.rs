//! SQLite persistence backend.
//!
//! A single database file with three tables:
//! - `conversations` — one row per chat, carrying the rolling summary and
//!   the message counters
//! - `messages` — the append-only turn log, ordered by insertion rowid
//! - `saved_recipes` — recipes the user chose to keep
//!
//! Two operations are transactional by contract:
//! - `append_message` inserts the row and bumps the parent conversation's
//!   counter in the same transaction
//! - `commit_summary` flips summarized flags and writes the summary text
//!   together, so a crash can never leave flags set without the summary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use souschef_core::error::StoreError;
use souschef_core::message::{Conversation, ConversationId, Message, MessageIntent, NewMessage, Role};
use souschef_core::store::{MessageFilter, MessageStore, NewSavedRecipe, RecipeStore, SavedRecipe};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// The production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL DEFAULT 'New Chat',
                summary         TEXT,
                message_count   INTEGER NOT NULL DEFAULT 0,
                last_summary_at INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        // Integer rowid keeps messages in insertion order even when
        // timestamps collide within one turn.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT UNIQUE NOT NULL,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                intent          TEXT NOT NULL DEFAULT 'general_question',
                summarized      INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_recipes (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                difficulty      TEXT,
                cuisine         TEXT,
                prep_time       TEXT,
                servings        TEXT,
                conversation_id TEXT REFERENCES conversations(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("saved_recipes table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        let id: String = column(row, "id")?;
        let user_id: String = column(row, "user_id")?;
        let title: String = column(row, "title")?;
        let summary: Option<String> = column(row, "summary")?;
        let message_count: i64 = column(row, "message_count")?;
        let last_summary_at: i64 = column(row, "last_summary_at")?;
        let created_at: String = column(row, "created_at")?;
        let updated_at: String = column(row, "updated_at")?;

        Ok(Conversation {
            id: ConversationId(id),
            user_id,
            title,
            summary,
            message_count,
            last_summary_at,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let id: String = column(row, "id")?;
        let conversation_id: String = column(row, "conversation_id")?;
        let role_str: String = column(row, "role")?;
        let content: String = column(row, "content")?;
        let intent_str: String = column(row, "intent")?;
        let summarized: i64 = column(row, "summarized")?;
        let created_at: String = column(row, "created_at")?;

        let role = Role::parse(&role_str)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown role: {role_str}")))?;

        Ok(Message {
            id,
            conversation_id: ConversationId(conversation_id),
            role,
            content,
            intent: MessageIntent::parse(&intent_str),
            summarized: summarized != 0,
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_recipe(row: &sqlx::sqlite::SqliteRow) -> Result<SavedRecipe, StoreError> {
        let id: String = column(row, "id")?;
        let user_id: String = column(row, "user_id")?;
        let title: String = column(row, "title")?;
        let content: String = column(row, "content")?;
        let difficulty: Option<String> = column(row, "difficulty")?;
        let cuisine: Option<String> = column(row, "cuisine")?;
        let prep_time: Option<String> = column(row, "prep_time")?;
        let servings: Option<String> = column(row, "servings")?;
        let conversation_id: Option<String> = column(row, "conversation_id")?;
        let created_at: String = column(row, "created_at")?;

        Ok(SavedRecipe {
            id,
            user_id,
            title,
            content,
            difficulty,
            cuisine,
            prep_time,
            servings,
            conversation_id: conversation_id.map(ConversationId),
            created_at: parse_timestamp(&created_at),
        })
    }

    /// Escape SQL LIKE wildcards so a needle is matched literally.
    fn escape_like(needle: &str) -> String {
        needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    }
}

fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MessageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new(user_id);
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, title, summary, message_count, last_summary_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, 0, 0, ?4, ?5)
            "#,
        )
        .bind(&conversation.id.0)
        .bind(&conversation.user_id)
        .bind(&conversation.title)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT conversation: {e}")))?;

        debug!(conversation_id = %conversation.id, "Created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT conversation: {e}")))?;

        match row {
            Some(ref r) => Self::row_to_conversation(r),
            None => Err(StoreError::ConversationNotFound(id.to_string())),
        }
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT conversations: {e}")))?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let now = Utc::now();
        let stored = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: id.clone(),
            role: message.role,
            content: message.content,
            intent: message.intent,
            summarized: false,
            created_at: now,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN append: {e}")))?;

        // Counter increment is part of the append operation itself.
        let updated = sqlx::query(
            "UPDATE conversations SET message_count = message_count + 1, updated_at = ?2 WHERE id = ?1",
        )
        .bind(&id.0)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE counter: {e}")))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, intent, summarized, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&stored.id)
        .bind(&id.0)
        .bind(stored.role.as_str())
        .bind(&stored.content)
        .bind(stored.intent.as_str())
        .bind(stored.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT append: {e}")))?;

        debug!(conversation_id = %id, role = stored.role.as_str(), "Appended message");
        Ok(stored)
    }

    async fn messages(
        &self,
        id: &ConversationId,
        filter: MessageFilter,
    ) -> Result<Vec<Message>, StoreError> {
        let mut sql = String::from("SELECT * FROM messages WHERE conversation_id = ?1");
        if filter.unsummarized_only {
            sql.push_str(" AND summarized = 0");
        }
        if filter.role.is_some() {
            sql.push_str(" AND role = ?2");
        }
        if filter.intent.is_some() {
            // Parameter index depends on whether role is also bound.
            if filter.role.is_some() {
                sql.push_str(" AND intent = ?3");
            } else {
                sql.push_str(" AND intent = ?2");
            }
        }
        sql.push_str(" ORDER BY iid ASC");

        let mut query = sqlx::query(&sql).bind(&id.0);
        if let Some(role) = filter.role {
            query = query.bind(role.as_str());
        }
        if let Some(intent) = filter.intent {
            query = query.bind(intent.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY iid DESC LIMIT ?2",
        )
        .bind(&id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT recent: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn latest_assistant_containing(
        &self,
        id: &ConversationId,
        needle: &str,
    ) -> Result<Option<Message>, StoreError> {
        let pattern = format!("%{}%", Self::escape_like(needle));
        let row = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = ?1 AND role = 'assistant' AND content LIKE ?2 ESCAPE '\'
            ORDER BY iid DESC
            LIMIT 1
            "#,
        )
        .bind(&id.0)
        .bind(&pattern)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT latest containing: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_message(r)?)),
            None => Ok(None),
        }
    }

    async fn commit_summary(
        &self,
        id: &ConversationId,
        summary: &str,
        message_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN summary: {e}")))?;

        // last_summary_at is read from the counter inside the same
        // transaction, so concurrent appends cannot skew it.
        let updated = sqlx::query(
            "UPDATE conversations SET summary = ?2, last_summary_at = message_count WHERE id = ?1",
        )
        .bind(&id.0)
        .bind(summary)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE summary: {e}")))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(id.to_string()));
        }

        if !message_ids.is_empty() {
            let placeholders: Vec<String> = (0..message_ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = format!(
                "UPDATE messages SET summarized = 1 WHERE conversation_id = ?1 AND id IN ({})",
                placeholders.join(", ")
            );
            let mut query = sqlx::query(&sql).bind(&id.0);
            for message_id in message_ids {
                query = query.bind(message_id);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("UPDATE summarized flags: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT summary: {e}")))?;

        debug!(conversation_id = %id, flagged = message_ids.len(), "Committed summary");
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for SqliteStore {
    async fn save_recipe(&self, recipe: NewSavedRecipe) -> Result<SavedRecipe, StoreError> {
        // One saved recipe per (conversation, user): update in place.
        if let Some(conv_id) = &recipe.conversation_id {
            let existing = sqlx::query(
                "SELECT id FROM saved_recipes WHERE conversation_id = ?1 AND user_id = ?2",
            )
            .bind(&conv_id.0)
            .bind(&recipe.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT existing recipe: {e}")))?;

            if let Some(row) = existing {
                let existing_id: String = column(&row, "id")?;
                sqlx::query(
                    r#"
                    UPDATE saved_recipes
                    SET title = ?2, content = ?3, difficulty = ?4, cuisine = ?5, prep_time = ?6, servings = ?7
                    WHERE id = ?1
                    "#,
                )
                .bind(&existing_id)
                .bind(&recipe.title)
                .bind(&recipe.content)
                .bind(&recipe.difficulty)
                .bind(&recipe.cuisine)
                .bind(&recipe.prep_time)
                .bind(&recipe.servings)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("UPDATE recipe: {e}")))?;

                return self.get_recipe(&existing_id).await;
            }
        }

        let saved = SavedRecipe {
            id: Uuid::new_v4().to_string(),
            user_id: recipe.user_id,
            title: recipe.title,
            content: recipe.content,
            difficulty: recipe.difficulty,
            cuisine: recipe.cuisine,
            prep_time: recipe.prep_time,
            servings: recipe.servings,
            conversation_id: recipe.conversation_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO saved_recipes (id, user_id, title, content, difficulty, cuisine, prep_time, servings, conversation_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&saved.id)
        .bind(&saved.user_id)
        .bind(&saved.title)
        .bind(&saved.content)
        .bind(&saved.difficulty)
        .bind(&saved.cuisine)
        .bind(&saved.prep_time)
        .bind(&saved.servings)
        .bind(saved.conversation_id.as_ref().map(|c| c.0.as_str()))
        .bind(saved.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT recipe: {e}")))?;

        debug!(recipe_id = %saved.id, "Saved recipe");
        Ok(saved)
    }

    async fn list_recipes(&self, user_id: &str) -> Result<Vec<SavedRecipe>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM saved_recipes WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("SELECT recipes: {e}")))?;

        rows.iter().map(Self::row_to_recipe).collect()
    }

    async fn get_recipe(&self, id: &str) -> Result<SavedRecipe, StoreError> {
        let row = sqlx::query("SELECT * FROM saved_recipes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT recipe: {e}")))?;

        match row {
            Some(ref r) => Self::row_to_recipe(r),
            None => Err(StoreError::RecipeNotFound(id.to_string())),
        }
    }

    async fn delete_recipe(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM saved_recipes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE recipe: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

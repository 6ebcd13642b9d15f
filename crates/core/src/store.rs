//! Storage traits — the persistence boundary of the conversational core.
//!
//! The engine, summarizer, and context assembler only ever talk to these
//! traits. Implementations: SQLite (production), in-memory (tests).
//!
//! Two deliberate contract points:
//! - `append_message` increments the parent conversation's message counter
//!   atomically as part of the same transaction — the counter is part of
//!   the append operation, not a side effect of saving.
//! - `commit_summary` flips the summarized flags, writes the summary text,
//!   and records `last_summary_at` in one transaction; a partial commit of
//!   flags without text (or vice versa) must be impossible.

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, Message, MessageIntent, NewMessage, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filter for querying a conversation's messages.
///
/// All criteria are ANDed; results are always ordered by creation time
/// (oldest first), ties broken by insertion order.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Only messages not yet folded into the rolling summary.
    pub unsummarized_only: bool,

    /// Only messages with this role.
    pub role: Option<Role>,

    /// Only messages with this intent.
    pub intent: Option<MessageIntent>,
}

impl MessageFilter {
    pub fn unsummarized() -> Self {
        Self {
            unsummarized_only: true,
            ..Self::default()
        }
    }
}

/// The conversation/message persistence boundary.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a new empty conversation for a user.
    async fn create_conversation(
        &self,
        user_id: &str,
    ) -> std::result::Result<Conversation, StoreError>;

    /// Fetch a conversation by id.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Conversation, StoreError>;

    /// List a user's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<Conversation>, StoreError>;

    /// Delete a conversation and all of its messages.
    async fn delete_conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<bool, StoreError>;

    /// Append a message, atomically incrementing the conversation's
    /// message counter and bumping its updated timestamp.
    async fn append_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> std::result::Result<Message, StoreError>;

    /// Query messages in creation order, oldest first.
    async fn messages(
        &self,
        id: &ConversationId,
        filter: MessageFilter,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// The newest `limit` messages, newest first.
    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// The most recent assistant message whose content contains `needle`.
    ///
    /// Used for current-recipe lookup; the caller supplies the marker so
    /// the store stays format-agnostic.
    async fn latest_assistant_containing(
        &self,
        id: &ConversationId,
        needle: &str,
    ) -> std::result::Result<Option<Message>, StoreError>;

    /// Atomically: mark `message_ids` as summarized, store `summary` on
    /// the conversation, and set `last_summary_at` to the current
    /// message count.
    async fn commit_summary(
        &self,
        id: &ConversationId,
        summary: &str,
        message_ids: &[String],
    ) -> std::result::Result<(), StoreError>;
}

/// A recipe the user chose to keep, extracted from assistant output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecipe {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,

    /// Conversation the recipe came from, if it still exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    pub created_at: DateTime<Utc>,
}

/// Fields supplied when saving a recipe; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSavedRecipe {
    pub user_id: String,
    pub title: String,
    pub content: String,

    #[serde(default)]
    pub difficulty: Option<String>,

    #[serde(default)]
    pub cuisine: Option<String>,

    #[serde(default)]
    pub prep_time: Option<String>,

    #[serde(default)]
    pub servings: Option<String>,

    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// Persistence for saved recipes (peripheral save/recommendation feature).
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Save a recipe. If one already exists for the same conversation and
    /// user, it is updated in place instead of duplicated.
    async fn save_recipe(
        &self,
        recipe: NewSavedRecipe,
    ) -> std::result::Result<SavedRecipe, StoreError>;

    /// List a user's saved recipes, newest first.
    async fn list_recipes(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<SavedRecipe>, StoreError>;

    /// Fetch a saved recipe by id.
    async fn get_recipe(&self, id: &str) -> std::result::Result<SavedRecipe, StoreError>;

    /// Delete a saved recipe. Returns whether anything was removed.
    async fn delete_recipe(&self, id: &str) -> std::result::Result<bool, StoreError>;
}

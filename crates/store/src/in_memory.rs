//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use souschef_core::error::StoreError;
use souschef_core::message::{Conversation, ConversationId, Message, NewMessage, Role};
use souschef_core::store::{MessageFilter, MessageStore, NewSavedRecipe, RecipeStore, SavedRecipe};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, Conversation>,
    /// Append order doubles as the total message order.
    messages: Vec<Message>,
    recipes: Vec<SavedRecipe>,
}

/// A store that keeps everything in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new(user_id);
        self.inner
            .write()
            .await
            .conversations
            .insert(conversation.id.0.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, StoreError> {
        self.inner
            .read()
            .await
            .conversations
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.conversations.remove(&id.0).is_some();
        if removed {
            inner.messages.retain(|m| m.conversation_id != *id);
            for recipe in inner.recipes.iter_mut() {
                if recipe.conversation_id.as_ref() == Some(id) {
                    recipe.conversation_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let conversation = inner
            .conversations
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        conversation.message_count += 1;
        conversation.updated_at = now;

        let stored = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: id.clone(),
            role: message.role,
            content: message.content,
            intent: message.intent,
            summarized: false,
            created_at: now,
        };
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn messages(
        &self,
        id: &ConversationId,
        filter: MessageFilter,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == *id)
            .filter(|m| !filter.unsummarized_only || !m.summarized)
            .filter(|m| filter.role.map_or(true, |r| m.role == r))
            .filter(|m| filter.intent.map_or(true, |i| m.intent == i))
            .cloned()
            .collect())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == *id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_assistant_containing(
        &self,
        id: &ConversationId,
        needle: &str,
    ) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .rev()
            .find(|m| {
                m.conversation_id == *id && m.role == Role::Assistant && m.content.contains(needle)
            })
            .cloned())
    }

    async fn commit_summary(
        &self,
        id: &ConversationId,
        summary: &str,
        message_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        for message in inner.messages.iter_mut() {
            if message.conversation_id == *id && message_ids.contains(&message.id) {
                message.summarized = true;
            }
        }

        let conversation = inner
            .conversations
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        conversation.summary = Some(summary.to_string());
        conversation.last_summary_at = conversation.message_count;
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for InMemoryStore {
    async fn save_recipe(&self, recipe: NewSavedRecipe) -> Result<SavedRecipe, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(conv_id) = &recipe.conversation_id {
            if let Some(existing) = inner
                .recipes
                .iter_mut()
                .find(|r| r.conversation_id.as_ref() == Some(conv_id) && r.user_id == recipe.user_id)
            {
                existing.title = recipe.title;
                existing.content = recipe.content;
                existing.difficulty = recipe.difficulty;
                existing.cuisine = recipe.cuisine;
                existing.prep_time = recipe.prep_time;
                existing.servings = recipe.servings;
                return Ok(existing.clone());
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
        inner.recipes.push(saved.clone());
        Ok(saved)
    }

    async fn list_recipes(&self, user_id: &str) -> Result<Vec<SavedRecipe>, StoreError> {
        let inner = self.inner.read().await;
        let mut recipes: Vec<SavedRecipe> = inner
            .recipes
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recipes)
    }

    async fn get_recipe(&self, id: &str) -> Result<SavedRecipe, StoreError> {
        self.inner
            .read()
            .await
            .recipes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::RecipeNotFound(id.to_string()))
    }

    async fn delete_recipe(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.recipes.len();
        inner.recipes.retain(|r| r.id != id);
        Ok(inner.recipes.len() < before)
    }
}

//! Context assembly — deciding exactly what the model sees each turn.
//!
//! Assembly is pure over a [`ContextInput`] snapshot; the async
//! [`ContextBuilder::assemble_for`] wrapper fetches that snapshot from the
//! store. Construction order is fixed:
//!
//! 1. Classify the current message
//! 2. Recipe context (fresh full-text lookup, not the summary): for a
//!    modification the system entry mandates reproducing every section;
//!    otherwise a short preserve-structure note rides along
//! 3. Exactly one of {full formatting instructions, short generic prompt}
//! 4. The rolling summary, when one exists
//! 5. Recent history, newest-first walk bounded by a message cap and a
//!    word budget, emitted in chronological order
//!
//! Assembly never mutates stored state; the summarizer owns all writes.

use souschef_core::error::StoreError;
use souschef_core::message::{Conversation, Message, MessageIntent, Role};
use souschef_core::model::ChatMessage;
use souschef_core::store::MessageStore;
use souschef_recipes::{format_template, TITLE_MARKER};
use tracing::debug;

use crate::classifier::classify;

/// Default cap on historical messages per turn.
pub const DEFAULT_HISTORY_MAX_MESSAGES: usize = 6;

/// Default word budget for assembled history (token proxy).
pub const DEFAULT_HISTORY_WORD_BUDGET: usize = 2000;

const SHORT_PROMPT: &str = "You are SousChef, an expert cooking assistant. \
    Help with cooking techniques and answer questions about the current recipe.";

/// Approximate token count: whitespace-delimited words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn full_instructions() -> String {
    format!(
        "You are SousChef, an expert cooking assistant. You help users with recipes, \
         cooking techniques, and culinary advice. Be friendly, professional, and focus \
         on providing accurate cooking information.\n\n\
         When providing recipes, always use this format with exact spacing and line breaks:\n{}",
        format_template()
    )
}

fn recipe_context_for_modification(recipe: &str) -> String {
    format!(
        "Current recipe context:\n{recipe}\n\n\
         The user is asking to modify this recipe. Your response must reproduce the \
         complete updated recipe with every section present, in the same fixed order, \
         using the same structural markers, before describing what changed. \
         Do not drop or rename any section."
    )
}

fn recipe_context_general(recipe: &str) -> String {
    format!(
        "Current recipe context:\n{recipe}\n\n\
         Preserve this structure in any future recipe edits."
    )
}

/// Everything the pure assembler needs, snapshotted from the store.
#[derive(Debug, Clone, Default)]
pub struct ContextInput {
    /// The most recent assistant message containing the title marker.
    pub current_recipe: Option<String>,

    /// The conversation's rolling summary, if any.
    pub summary: Option<String>,

    /// Recent messages, newest first.
    pub recent: Vec<Message>,
}

/// The context assembler. Stateless — create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_max_messages: usize,
    history_word_budget: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            history_max_messages: DEFAULT_HISTORY_MAX_MESSAGES,
            history_word_budget: DEFAULT_HISTORY_WORD_BUDGET,
        }
    }
}

impl ContextBuilder {
    pub fn new(history_max_messages: usize, history_word_budget: usize) -> Self {
        Self {
            history_max_messages,
            history_word_budget,
        }
    }

    /// Fetch the snapshot for a conversation and assemble its context.
    pub async fn assemble_for(
        &self,
        store: &dyn MessageStore,
        conversation: &Conversation,
        current_text: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let current_recipe = store
            .latest_assistant_containing(&conversation.id, TITLE_MARKER)
            .await?
            .map(|m| m.content);
        let recent = store
            .recent_messages(&conversation.id, self.history_max_messages)
            .await?;

        let input = ContextInput {
            current_recipe,
            summary: conversation.summary.clone(),
            recent,
        };
        Ok(self.assemble(&input, current_text))
    }

    /// Assemble the ordered prompt entries for one turn.
    ///
    /// All system scaffolding comes first; history follows in
    /// chronological order, its newest entry being the current message
    /// (already appended to the log by the engine).
    pub fn assemble(&self, input: &ContextInput, current_text: &str) -> Vec<ChatMessage> {
        let intent = classify(current_text);
        let mut entries: Vec<ChatMessage> = Vec::new();

        // Recipe context rides ahead of everything else so edits always
        // see the full prior state.
        if let Some(recipe) = &input.current_recipe {
            let content = if intent == MessageIntent::RecipeModification {
                recipe_context_for_modification(recipe)
            } else {
                recipe_context_general(recipe)
            };
            entries.push(ChatMessage::system(content));
        }

        // Exactly one of the two instruction variants, always.
        let wants_full = current_text.to_lowercase().contains("recipe")
            || input.current_recipe.is_none();
        if wants_full {
            entries.push(ChatMessage::system(full_instructions()));
        } else {
            entries.push(ChatMessage::system(SHORT_PROMPT));
        }

        if let Some(summary) = &input.summary {
            if !summary.trim().is_empty() {
                entries.push(ChatMessage::system(format!(
                    "Conversation summary so far:\n{summary}"
                )));
            }
        }

        // Walk newest-first until the next message would blow either cap;
        // whatever accumulated is kept.
        let mut picked: Vec<&Message> = Vec::new();
        let mut words = 0usize;
        for message in &input.recent {
            if picked.len() >= self.history_max_messages {
                break;
            }
            let message_words = word_count(&message.content);
            if words + message_words > self.history_word_budget {
                break;
            }
            picked.push(message);
            words += message_words;
        }

        debug!(
            intent = %intent,
            history = picked.len(),
            words,
            full_instructions = wants_full,
            "Assembled context"
        );

        // Chronological order: oldest of the selected set first.
        for message in picked.iter().rev() {
            entries.push(match message.role {
                Role::User => ChatMessage::user(&message.content),
                Role::Assistant => ChatMessage::assistant(&message.content),
            });
        }

        entries
    }
}

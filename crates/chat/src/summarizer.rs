//! Rolling conversation summarization.
//!
//! Condenses the unsummarized part of a conversation into three labeled
//! sections and commits the result atomically: the summarized flags, the
//! summary text, and the `last_summary_at` counter either all land or
//! none do.
//!
//! Bucketing rules (applied in log order over unsummarized messages):
//! - **CURRENT RECIPE** — the last assistant message carrying the title
//!   marker; earlier recipe messages are overwritten
//! - **MODIFICATIONS** — assistant messages with modification intent,
//!   most recent three, chronological
//! - **IMPORTANT Q&A** — each cooking question paired with the message
//!   immediately after it in the log, kept only when that message is
//!   assistant-authored, most recent three pairs

use souschef_core::error::StoreError;
use souschef_core::message::{Conversation, Message, MessageIntent, Role};
use souschef_core::store::{MessageFilter, MessageStore};
use tracing::{debug, info};

/// How many modification entries the summary retains.
pub const MAX_MODIFICATIONS: usize = 3;

/// How many Q&A pairs the summary retains.
pub const MAX_QA_PAIRS: usize = 3;

/// Build a summary from the full ordered message log.
///
/// Returns `None` when there is nothing unsummarized (the caller keeps
/// the existing summary), otherwise the summary text and the ids of the
/// messages that were folded in.
pub fn build_summary(log: &[Message]) -> Option<(String, Vec<String>)> {
    let mut folded_ids: Vec<String> = Vec::new();
    let mut recipe_content: Option<&str> = None;
    let mut modifications: Vec<&str> = Vec::new();
    let mut qa_pairs: Vec<String> = Vec::new();

    for (position, message) in log.iter().enumerate() {
        if message.summarized {
            continue;
        }
        folded_ids.push(message.id.clone());

        if message.role == Role::Assistant && souschef_recipes::contains_recipe(&message.content) {
            // Only the most recent recipe is kept.
            recipe_content = Some(&message.content);
        } else if message.intent == MessageIntent::RecipeModification
            && message.role == Role::Assistant
        {
            modifications.push(&message.content);
        } else if message.intent == MessageIntent::CookingQuestion {
            // Pair with the literal next message in the log; the pair is
            // kept only when that message happens to be the answer. An
            // intervening user message drops the pair (kept behavior).
            if let Some(next) = log.get(position + 1) {
                if next.role == Role::Assistant {
                    qa_pairs.push(format!("Q: {}\nA: {}", message.content, next.content));
                }
            }
        }
    }

    if folded_ids.is_empty() {
        return None;
    }

    let mut parts: Vec<String> = Vec::new();

    if let Some(recipe) = recipe_content {
        parts.push(format!("CURRENT RECIPE:\n{recipe}"));
    }

    if !modifications.is_empty() {
        let start = modifications.len().saturating_sub(MAX_MODIFICATIONS);
        parts.push(format!("MODIFICATIONS:\n{}", modifications[start..].join("\n")));
    }

    if !qa_pairs.is_empty() {
        let start = qa_pairs.len().saturating_sub(MAX_QA_PAIRS);
        parts.push(format!("IMPORTANT Q&A:\n{}", qa_pairs[start..].join("\n")));
    }

    Some((parts.join("\n\n"), folded_ids))
}

/// Refresh a conversation's rolling summary.
///
/// Idempotent when nothing new has arrived: the stored summary is
/// returned unchanged and no counters move.
pub async fn summarize(
    store: &dyn MessageStore,
    conversation: &Conversation,
) -> Result<String, StoreError> {
    let log = store
        .messages(&conversation.id, MessageFilter::default())
        .await?;

    match build_summary(&log) {
        None => {
            debug!(conversation_id = %conversation.id, "No messages to summarize");
            Ok(conversation.summary.clone().unwrap_or_default())
        }
        Some((summary, folded_ids)) => {
            store
                .commit_summary(&conversation.id, &summary, &folded_ids)
                .await?;
            info!(
                conversation_id = %conversation.id,
                folded = folded_ids.len(),
                "Refreshed rolling summary"
            );
            Ok(summary)
        }
    }
}

//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the entire system:
//! User sends a message → Engine classifies it → Context is assembled →
//! Model generates a response → both sides of the turn are persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// Stored messages only ever carry these two roles; system scaffolding
/// exists solely in the assembled context, never in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// What the user is trying to do with a message.
///
/// Assigned by the classifier on the inbound side of a turn; the outbound
/// assistant message inherits the same category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageIntent {
    /// Request to produce a new recipe
    RecipeCreation,
    /// Request to alter an existing recipe
    RecipeModification,
    /// Factual/how-to question about technique
    CookingQuestion,
    /// Anything else
    GeneralQuestion,
}

impl MessageIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageIntent::RecipeCreation => "recipe_creation",
            MessageIntent::RecipeModification => "recipe_modification",
            MessageIntent::CookingQuestion => "cooking_question",
            MessageIntent::GeneralQuestion => "general_question",
        }
    }

    /// Parse a stored intent string, falling back to the generic category.
    pub fn parse(s: &str) -> Self {
        match s {
            "recipe_creation" => MessageIntent::RecipeCreation,
            "recipe_modification" => MessageIntent::RecipeModification,
            "cooking_question" => MessageIntent::CookingQuestion,
            _ => MessageIntent::GeneralQuestion,
        }
    }
}

impl Default for MessageIntent {
    fn default() -> Self {
        MessageIntent::GeneralQuestion
    }
}

impl std::fmt::Display for MessageIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single persisted message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Owning conversation
    pub conversation_id: ConversationId,

    /// Who sent this message
    pub role: Role,

    /// The text content (may embed structured recipe markup)
    pub content: String,

    /// Classified intent (defaults to the generic category)
    #[serde(default)]
    pub intent: MessageIntent,

    /// Whether this message has been folded into the rolling summary.
    /// Once true, never reset.
    #[serde(default)]
    pub summarized: bool,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

/// A message about to be appended — the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub intent: MessageIntent,
}

impl NewMessage {
    /// Create a new inbound user message.
    pub fn user(content: impl Into<String>, intent: MessageIntent) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            intent,
        }
    }

    /// Create a new outbound assistant message.
    pub fn assistant(content: impl Into<String>, intent: MessageIntent) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            intent,
        }
    }
}

/// A conversation: an ordered, append-only log of turns owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Owning user reference (opaque — auth lives outside the core)
    pub user_id: String,

    /// Display title
    pub title: String,

    /// Rolling summary of older turns, if one has been produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Total messages appended so far
    pub message_count: i64,

    /// Value of `message_count` when the summary was last refreshed
    pub last_summary_at: i64,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was appended
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            user_id: user_id.into(),
            title: "New Chat".into(),
            summary: None,
            message_count: 0,
            last_summary_at: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// How many messages have accumulated since the last summary refresh.
    pub fn unsummarized_backlog(&self) -> i64 {
        self.message_count - self.last_summary_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_is_empty() {
        let conv = Conversation::new("user_1");
        assert_eq!(conv.message_count, 0);
        assert_eq!(conv.last_summary_at, 0);
        assert_eq!(conv.title, "New Chat");
        assert!(conv.summary.is_none());
    }

    #[test]
    fn backlog_counts_since_last_summary() {
        let mut conv = Conversation::new("user_1");
        conv.message_count = 14;
        conv.last_summary_at = 10;
        assert_eq!(conv.unsummarized_backlog(), 4);
    }

    #[test]
    fn intent_round_trip() {
        for intent in [
            MessageIntent::RecipeCreation,
            MessageIntent::RecipeModification,
            MessageIntent::CookingQuestion,
            MessageIntent::GeneralQuestion,
        ] {
            assert_eq!(MessageIntent::parse(intent.as_str()), intent);
        }
    }

    #[test]
    fn unknown_intent_falls_back_to_general() {
        assert_eq!(
            MessageIntent::parse("something_else"),
            MessageIntent::GeneralQuestion
        );
    }

    #[test]
    fn role_round_trip() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn message_serialization_round_trip() {
        let msg = Message {
            id: "msg_1".into(),
            conversation_id: ConversationId::from("conv_1"),
            role: Role::User,
            content: "How long do I knead the dough?".into(),
            intent: MessageIntent::CookingQuestion,
            summarized: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, msg.content);
        assert_eq!(back.intent, MessageIntent::CookingQuestion);
        assert!(!back.summarized);
    }
}

//! The turn engine — one conversation turn from raw text to reply.
//!
//! Per-turn state machine: received → classified → (summarized?) →
//! context-built → model-called → persisted → responded. The inbound
//! message is persisted before the model call and is never rolled back:
//! if the model fails, the user's text survives and the turn can be
//! retried against the accumulated history.
//!
//! Turns on one conversation are logically sequential; callers must not
//! submit concurrent turns for the same conversation id (the gateway
//! serializes them with a per-conversation lock). Turns on different
//! conversations are fully independent.

use souschef_core::error::Error;
use souschef_core::message::{ConversationId, NewMessage};
use souschef_core::model::{ChatModel, ChatRequest, ModelConfig};
use souschef_core::store::MessageStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::context::ContextBuilder;
use crate::summarizer;

/// Default number of accumulated messages that triggers a summary refresh.
pub const DEFAULT_SUMMARY_THRESHOLD: i64 = 10;

/// The conversation orchestrator.
pub struct ChatEngine {
    /// The model backend to call
    model: Arc<dyn ChatModel>,

    /// Conversation persistence
    store: Arc<dyn MessageStore>,

    /// Model parameters, passed explicitly on every call
    config: ModelConfig,

    /// Context assembly settings
    context: ContextBuilder,

    /// Summary refresh threshold
    summary_threshold: i64,
}

impl ChatEngine {
    /// Create a new engine.
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn MessageStore>, config: ModelConfig) -> Self {
        Self {
            model,
            store,
            config,
            context: ContextBuilder::default(),
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
        }
    }

    /// Override the summary refresh threshold.
    pub fn with_summary_threshold(mut self, threshold: i64) -> Self {
        self.summary_threshold = threshold;
        self
    }

    /// Override the context assembly settings.
    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context = builder;
        self
    }

    /// Handle one user turn: persist the inbound message, refresh the
    /// summary if due, assemble context, call the model, persist the
    /// reply, and return its text.
    pub async fn handle_turn(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, Error> {
        // Fail fast on unknown conversations, before anything is written.
        self.store.get_conversation(conversation_id).await?;

        let intent = classify(text);
        info!(conversation_id = %conversation_id, intent = %intent, "Handling turn");

        self.store
            .append_message(conversation_id, NewMessage::user(text, intent))
            .await?;

        // Reload for fresh counters now that the inbound message landed.
        let mut conversation = self.store.get_conversation(conversation_id).await?;

        if conversation.unsummarized_backlog() >= self.summary_threshold {
            match summarizer::summarize(self.store.as_ref(), &conversation).await {
                Ok(summary) => {
                    conversation.last_summary_at = conversation.message_count;
                    conversation.summary = if summary.is_empty() {
                        None
                    } else {
                        Some(summary)
                    };
                }
                // Degraded but available: assemble with the stale summary.
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "Summarization failed; proceeding with stale summary"
                    );
                }
            }
        }

        let entries = self
            .context
            .assemble_for(self.store.as_ref(), &conversation, text)
            .await?;
        debug!(
            conversation_id = %conversation_id,
            entries = entries.len(),
            "Calling model"
        );

        let response = self
            .model
            .complete(ChatRequest {
                config: self.config.clone(),
                messages: entries,
            })
            .await?;

        self.store
            .append_message(
                conversation_id,
                NewMessage::assistant(&response.content, intent),
            )
            .await?;

        info!(
            conversation_id = %conversation_id,
            model = %response.model,
            "Turn complete"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use souschef_core::error::ModelError;
    use souschef_core::message::{MessageIntent, Role};
    use souschef_core::model::{ChatMessage, ChatResponse, ChatRole};
    use souschef_core::store::MessageFilter;
    use souschef_store::InMemoryStore;
    use std::sync::Mutex;

    /// A mock model that returns a fixed response and records the last
    /// request it received.
    struct MockModel {
        response: String,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl MockModel {
        fn new(response: &str) -> Self {
            Self {
                response: response.into(),
                last_request: Mutex::new(None),
            }
        }

        fn last_messages(&self) -> Vec<ChatMessage> {
            self.last_request
                .lock()
                .unwrap()
                .as_ref()
                .map(|r| r.messages.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(ChatResponse {
                content: self.response.clone(),
                model: "mock-model".into(),
                usage: None,
            })
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            Err(ModelError::Network("connection refused".into()))
        }
    }

    fn recipe(name: &str) -> String {
        format!("<h2 data-recipe=\"title\">🍳 {name}</h2>\nsections here")
    }

    fn engine(model: Arc<dyn ChatModel>, store: Arc<InMemoryStore>) -> ChatEngine {
        ChatEngine::new(model, store, ModelConfig::new("mock-model"))
    }

    #[tokio::test]
    async fn first_turn_creates_both_sides_of_the_exchange() {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(MockModel::new(&recipe("Chocolate Chip Cookies")));
        let engine = engine(model.clone(), store.clone());

        let conv = store.create_conversation("alice").await.unwrap();
        let reply = engine
            .handle_turn(&conv.id, "Give me a recipe for chocolate chip cookies")
            .await
            .unwrap();

        assert!(reply.contains("Chocolate Chip Cookies"));

        let refreshed = store.get_conversation(&conv.id).await.unwrap();
        assert_eq!(refreshed.message_count, 2);

        let log = store.messages(&conv.id, MessageFilter::default()).await.unwrap();
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].intent, MessageIntent::RecipeCreation);
        assert_eq!(log[1].role, Role::Assistant);
        assert!(souschef_recipes::contains_recipe(&log[1].content));

        // Context: full formatting instructions, no recipe-context entry.
        let sent = model.last_messages();
        let systems: Vec<_> = sent.iter().filter(|e| e.role == ChatRole::System).collect();
        assert_eq!(systems.len(), 1);
        assert!(systems[0].content.contains("always use this format"));
        assert!(!systems[0].content.contains("Current recipe context"));
        // The history window ends with the just-appended user message.
        assert_eq!(
            sent.last().unwrap().content,
            "Give me a recipe for chocolate chip cookies"
        );
    }

    #[tokio::test]
    async fn modification_turn_leads_with_prior_recipe_and_mandate() {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(MockModel::new(&recipe("Spicy Cookies")));
        let engine = engine(model.clone(), store.clone());

        let conv = store.create_conversation("alice").await.unwrap();
        store
            .append_message(
                &conv.id,
                NewMessage::assistant(recipe("Cookies"), MessageIntent::RecipeCreation),
            )
            .await
            .unwrap();

        engine.handle_turn(&conv.id, "Make it spicier").await.unwrap();

        let sent = model.last_messages();
        assert_eq!(sent[0].role, ChatRole::System);
        assert!(sent[0].content.contains("Current recipe context"));
        assert!(sent[0].content.contains("Cookies"));
        assert!(sent[0].content.contains("every section present"));

        let log = store.messages(&conv.id, MessageFilter::default()).await.unwrap();
        let outbound = log.last().unwrap();
        assert_eq!(outbound.role, Role::Assistant);
        assert_eq!(outbound.intent, MessageIntent::RecipeModification);
    }

    #[tokio::test]
    async fn threshold_triggers_summary_before_model_call() {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(MockModel::new("noted!"));
        let engine = engine(model.clone(), store.clone()).with_summary_threshold(10);

        let conv = store.create_conversation("alice").await.unwrap();

        // Seed nine messages: a recipe, some modifications, and Q&A turns.
        store
            .append_message(
                &conv.id,
                NewMessage::assistant(recipe("Pasta"), MessageIntent::RecipeCreation),
            )
            .await
            .unwrap();
        for i in 0..4 {
            store
                .append_message(
                    &conv.id,
                    NewMessage::user(format!("make change {i}"), MessageIntent::RecipeModification),
                )
                .await
                .unwrap();
            store
                .append_message(
                    &conv.id,
                    NewMessage::assistant(
                        format!("applied change {i}"),
                        MessageIntent::RecipeModification,
                    ),
                )
                .await
                .unwrap();
        }

        // Tenth message arrives through the engine and crosses the threshold.
        engine.handle_turn(&conv.id, "sounds good").await.unwrap();

        let refreshed = store.get_conversation(&conv.id).await.unwrap();
        let summary = refreshed.summary.expect("summary should exist");
        assert!(summary.contains("CURRENT RECIPE:"));
        assert!(summary.contains("Pasta"));
        // Only the most recent three modifications survive.
        assert!(!summary.contains("applied change 0"));
        assert!(summary.contains("applied change 1"));
        assert!(summary.contains("applied change 3"));
        assert!(refreshed.last_summary_at >= 10);

        // The summary was available to the same turn's context.
        let sent = model.last_messages();
        assert!(sent
            .iter()
            .any(|e| e.content.contains("Conversation summary so far")));
    }

    #[tokio::test]
    async fn below_threshold_no_summary_is_written() {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(MockModel::new("hi!"));
        let engine = engine(model, store.clone());

        let conv = store.create_conversation("alice").await.unwrap();
        engine.handle_turn(&conv.id, "hello").await.unwrap();

        let refreshed = store.get_conversation(&conv.id).await.unwrap();
        assert!(refreshed.summary.is_none());
        assert_eq!(refreshed.last_summary_at, 0);
    }

    #[tokio::test]
    async fn model_failure_keeps_inbound_message() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(Arc::new(FailingModel), store.clone());

        let conv = store.create_conversation("alice").await.unwrap();
        let err = engine.handle_turn(&conv.id, "hello").await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));

        // The user's message survived the failed call.
        let refreshed = store.get_conversation(&conv.id).await.unwrap();
        assert_eq!(refreshed.message_count, 1);
        let log = store.messages(&conv.id, MessageFilter::default()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
    }

    #[tokio::test]
    async fn unknown_conversation_is_an_error_before_any_write() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(Arc::new(MockModel::new("hi")), store.clone());

        let err = engine
            .handle_turn(&ConversationId::from("missing"), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn second_recipe_replaces_first_as_current() {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(MockModel::new("answered"));
        let engine = engine(model.clone(), store.clone());

        let conv = store.create_conversation("alice").await.unwrap();
        store
            .append_message(
                &conv.id,
                NewMessage::assistant(recipe("Pasta"), MessageIntent::RecipeCreation),
            )
            .await
            .unwrap();
        store
            .append_message(
                &conv.id,
                NewMessage::assistant(recipe("Ramen"), MessageIntent::RecipeCreation),
            )
            .await
            .unwrap();

        engine.handle_turn(&conv.id, "can we substitute the noodles").await.unwrap();

        let sent = model.last_messages();
        assert!(sent[0].content.contains("Ramen"));
        assert!(!sent[0].content.contains("Pasta"));
    }
}

//! HTTP JSON API gateway for SousChef.
//!
//! Exposes the turn entry point plus conversation and saved-recipe CRUD.
//! Responses use the `{"success": bool, ...}` envelope the original web
//! client speaks.
//!
//! Turns are serialized per conversation: the log is a single-writer
//! append structure, so the gateway takes a per-conversation async lock
//! around the turn entry point. Turns on different conversations run
//! concurrently.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use souschef_chat::ChatEngine;
use souschef_core::error::{Error, StoreError};
use souschef_core::message::ConversationId;
use souschef_core::store::{MessageFilter, MessageStore, NewSavedRecipe, RecipeStore};
use souschef_recipes::RecipeArtifact;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: ChatEngine,
    pub store: Arc<dyn MessageStore>,
    pub recipes: Arc<dyn RecipeStore>,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GatewayState {
    pub fn new(
        engine: ChatEngine,
        store: Arc<dyn MessageStore>,
        recipes: Arc<dyn RecipeStore>,
    ) -> Self {
        Self {
            engine,
            store,
            recipes,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock guarding turns for one conversation.
    async fn turn_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/v1/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/api/v1/conversations/{id}",
            delete(delete_conversation_handler),
        )
        .route(
            "/api/v1/conversations/{id}/messages",
            get(list_messages_handler).post(send_message_handler),
        )
        .route(
            "/api/v1/recipes",
            get(list_recipes_handler).post(save_recipe_handler),
        )
        .route(
            "/api/v1/recipes/{id}",
            get(get_recipe_handler).delete(delete_recipe_handler),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: souschef_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let db_path = config.storage.effective_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(
        souschef_store::SqliteStore::new(&format!("sqlite://{}", db_path.display())).await?,
    );

    let model = souschef_providers::build_from_config(&config)
        .ok_or("No API key configured — set SOUSCHEF_API_KEY or OPENROUTER_API_KEY")?;

    let model_config = souschef_core::model::ModelConfig {
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        max_tokens: Some(config.default_max_tokens),
    };

    let engine = ChatEngine::new(model, store.clone(), model_config)
        .with_summary_threshold(config.chat.summary_threshold)
        .with_context_builder(souschef_chat::ContextBuilder::new(
            config.chat.history_max_messages,
            config.chat.history_word_budget,
        ));

    let state = Arc::new(GatewayState::new(engine, store.clone(), store));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Error mapping ---

fn store_error_response(err: &StoreError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        StoreError::ConversationNotFound(_) | StoreError::RecipeNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "success": false, "error": err.to_string() })))
}

fn turn_error_response(err: &Error) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        Error::Store(store_err) => store_error_response(store_err),
        Error::Model(model_err) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "error": model_err.to_string() })),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": other.to_string() })),
        ),
    }
}

// --- Request bodies ---

fn default_user() -> String {
    "local".into()
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(default = "default_user")]
    user: String,
}

#[derive(Debug, Deserialize)]
struct CreateConversationRequest {
    #[serde(default = "default_user")]
    user: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SaveRecipeRequest {
    #[serde(default = "default_user")]
    user: String,
    title: String,
    content: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    prep_time: Option<String>,
    #[serde(default)]
    servings: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

// --- Handlers ---

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_conversation_handler(
    State(state): State<SharedState>,
    Json(body): Json<CreateConversationRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.create_conversation(&body.user).await {
        Ok(conversation) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "conversation": conversation })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn list_conversations_handler(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.list_conversations(&query.user).await {
        Ok(conversations) => (
            StatusCode::OK,
            Json(json!({ "success": true, "conversations": conversations })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn delete_conversation_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state
        .store
        .delete_conversation(&ConversationId::from(&id))
        .await
    {
        Ok(true) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Conversation not found" })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn list_messages_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let conversation_id = ConversationId::from(&id);
    match state
        .store
        .messages(&conversation_id, MessageFilter::default())
        .await
    {
        Ok(messages) => (
            StatusCode::OK,
            Json(json!({ "success": true, "messages": messages })),
        ),
        Err(e) => store_error_response(&e),
    }
}

/// The turn entry point. One in-flight turn per conversation.
async fn send_message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let conversation_id = ConversationId::from(&id);

    let lock = state.turn_lock(&id).await;
    let _guard = lock.lock().await;

    match state.engine.handle_turn(&conversation_id, &body.message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": reply })),
        ),
        Err(e) => {
            warn!(conversation_id = %id, error = %e, "Turn failed");
            turn_error_response(&e)
        }
    }
}

async fn save_recipe_handler(
    State(state): State<SharedState>,
    Json(body): Json<SaveRecipeRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    // Metadata the client didn't supply is recovered from the artifact.
    let artifact = RecipeArtifact::parse(&body.content);
    let metadata = artifact.metadata();

    let recipe = NewSavedRecipe {
        user_id: body.user,
        title: body.title,
        content: body.content.clone(),
        difficulty: body.difficulty.or(metadata.difficulty),
        cuisine: body.cuisine.or(metadata.cuisine),
        prep_time: body.prep_time.or(metadata.prep_time),
        servings: body.servings.or(metadata.servings),
        conversation_id: body.conversation_id.map(|id| ConversationId::from(&id)),
    };

    match state.recipes.save_recipe(recipe).await {
        Ok(saved) => (
            StatusCode::OK,
            Json(json!({ "success": true, "recipe": saved })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn list_recipes_handler(
    State(state): State<SharedState>,
    Query(query): Query<UserQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.recipes.list_recipes(&query.user).await {
        Ok(recipes) => (
            StatusCode::OK,
            Json(json!({ "success": true, "recipes": recipes })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn get_recipe_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.recipes.get_recipe(&id).await {
        Ok(recipe) => (
            StatusCode::OK,
            Json(json!({ "success": true, "recipe": recipe })),
        ),
        Err(e) => store_error_response(&e),
    }
}

async fn delete_recipe_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.recipes.delete_recipe(&id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Recipe not found" })),
        ),
        Err(e) => store_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use souschef_core::error::ModelError;
    use souschef_core::model::{ChatModel, ChatRequest, ChatResponse, ModelConfig};
    use souschef_store::InMemoryStore;
    use tower::ServiceExt;

    struct MockModel;

    #[async_trait]
    impl ChatModel for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            Ok(ChatResponse {
                content: "<h2 data-recipe=\"title\">🍳 Cookies</h2>\n...".into(),
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
            Err(ModelError::Network("unreachable".into()))
        }
    }

    fn test_app(model: Arc<dyn ChatModel>) -> (Router, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = ChatEngine::new(model, store.clone(), ModelConfig::new("mock-model"));
        let state = Arc::new(GatewayState::new(
            engine,
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn RecipeStore>,
        ));
        (build_router(state), store)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = test_app(Arc::new(MockModel));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_chat_round_trip() {
        let (app, store) = test_app(Arc::new(MockModel));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/conversations",
                serde_json::json!({ "user": "alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["conversation"]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/conversations/{id}/messages"),
                serde_json::json!({ "message": "recipe for cookies please" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = body_json(response).await;
        assert_eq!(reply["success"], true);
        assert!(reply["message"].as_str().unwrap().contains("Cookies"));

        let conversation = store
            .get_conversation(&ConversationId::from(&id))
            .await
            .unwrap();
        assert_eq!(conversation.message_count, 2);
    }

    #[tokio::test]
    async fn unknown_conversation_is_404() {
        let (app, _) = test_app(Arc::new(MockModel));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/conversations/missing/messages",
                serde_json::json!({ "message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn model_failure_is_bad_gateway_with_envelope() {
        let (app, store) = test_app(Arc::new(FailingModel));
        let conv = store.create_conversation("alice").await.unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/conversations/{}/messages", conv.id),
                serde_json::json!({ "message": "hello" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Network"));

        // The inbound message survived the failure.
        let conversation = store.get_conversation(&conv.id).await.unwrap();
        assert_eq!(conversation.message_count, 1);
    }

    #[tokio::test]
    async fn save_recipe_fills_metadata_from_artifact() {
        let (app, _) = test_app(Arc::new(MockModel));

        let content = "<h2 data-recipe=\"title\">🍳 Cookies</h2>\n\n\
                       <h3 data-recipe=\"difficulty\">⚡ Difficulty</h3>\nEasy\n\n\
                       <h3 data-recipe=\"cuisine\">🌍 Cuisine Type</h3>\nAmerican\n";
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/recipes",
                serde_json::json!({ "user": "alice", "title": "Cookies", "content": content }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["recipe"]["difficulty"], "Easy");
        assert_eq!(body["recipe"]["cuisine"], "American");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/recipes?user=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listing = body_json(response).await;
        assert_eq!(listing["recipes"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_recipe_is_404() {
        let (app, _) = test_app(Arc::new(MockModel));
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/recipes/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

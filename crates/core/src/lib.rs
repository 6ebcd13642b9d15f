//! # SousChef Core
//!
//! Domain types, traits, and error definitions for the SousChef recipe
//! assistant. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod model;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ModelError, Result, StoreError};
pub use message::{Conversation, ConversationId, Message, MessageIntent, NewMessage, Role};
pub use model::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, EmbeddingRequest,
    EmbeddingResponse, ModelConfig, Usage,
};
pub use store::{MessageFilter, MessageStore, NewSavedRecipe, RecipeStore, SavedRecipe};

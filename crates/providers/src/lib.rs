//! LLM backend implementations for SousChef.
//!
//! The only production backend is the OpenAI-compatible client, which
//! covers OpenAI, OpenRouter, Ollama, vLLM, and most hosted providers.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;

use souschef_config::AppConfig;
use souschef_core::model::ChatModel;
use std::sync::Arc;

/// Build the configured model backend.
///
/// Returns `None` when no API key is available for a remote provider
/// (Ollama needs none).
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn ChatModel>> {
    match config.default_provider.as_str() {
        "ollama" => Some(Arc::new(OpenAiCompatModel::ollama(
            config.api_url.as_deref(),
        ))),
        "openai" => {
            let key = config.api_key.clone()?;
            Some(Arc::new(OpenAiCompatModel::openai(key)))
        }
        // OpenRouter is the default; any other name is treated as a
        // custom OpenAI-compatible endpoint when api_url is set.
        _ => {
            let key = config.api_key.clone()?;
            match &config.api_url {
                Some(url) => Some(Arc::new(OpenAiCompatModel::new(
                    config.default_provider.clone(),
                    url.clone(),
                    key,
                ))),
                None => Some(Arc::new(OpenAiCompatModel::openrouter(key))),
            }
        }
    }
}

//! `souschef chat` — interactive or single-message chat mode.

use souschef_chat::{ChatEngine, ContextBuilder};
use souschef_config::AppConfig;
use souschef_core::message::ConversationId;
use souschef_core::model::ModelConfig;
use souschef_core::store::MessageStore;
use std::io::{BufRead, Write};

use super::{open_store, LOCAL_USER};

pub async fn run(
    message: Option<String>,
    conversation: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early (Ollama is the one backend without one).
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
        eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
        eprintln!("    export SOUSCHEF_API_KEY='sk-...'           (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let store = open_store(&config).await?;
    let model = souschef_providers::build_from_config(&config)
        .ok_or("No model backend configured")?;

    let model_config = ModelConfig {
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        max_tokens: Some(config.default_max_tokens),
    };

    let engine = ChatEngine::new(model, store.clone(), model_config)
        .with_summary_threshold(config.chat.summary_threshold)
        .with_context_builder(ContextBuilder::new(
            config.chat.history_max_messages,
            config.chat.history_word_budget,
        ));

    // Resume an existing conversation or start a fresh one.
    let conversation_id = match conversation {
        Some(id) => {
            let id = ConversationId::from(&id);
            store.get_conversation(&id).await?;
            id
        }
        None => store.create_conversation(LOCAL_USER).await?.id,
    };

    if let Some(text) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = engine.handle_turn(&conversation_id, &text).await?;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  SousChef — ask for a recipe, then refine it.");
    println!();
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  Conversation:  {conversation_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let stdin = std::io::stdin();
    print!("  You > ");
    std::io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let text = line.trim();

        if text.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        eprint!("  ...");
        match engine.handle_turn(&conversation_id, text).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  SousChef > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Bon appétit! 👋");
    println!();

    Ok(())
}

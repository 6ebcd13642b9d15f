//! `souschef conversations` — list or delete conversations.

use souschef_config::AppConfig;
use souschef_core::message::ConversationId;
use souschef_core::store::MessageStore;

use super::{open_store, LOCAL_USER};

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = open_store(&config).await?;

    let conversations = store.list_conversations(LOCAL_USER).await?;
    if conversations.is_empty() {
        println!("No conversations yet. Start one with: souschef chat");
        return Ok(());
    }

    println!("{:<38} {:<10} {:<22} TITLE", "ID", "MESSAGES", "UPDATED");
    for conversation in conversations {
        println!(
            "{:<38} {:<10} {:<22} {}",
            conversation.id,
            conversation.message_count,
            conversation.updated_at.format("%Y-%m-%d %H:%M:%S"),
            conversation.title,
        );
    }
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let store = open_store(&config).await?;

    if store.delete_conversation(&ConversationId::from(id)).await? {
        println!("Deleted conversation {id}");
    } else {
        println!("No conversation with id {id}");
    }
    Ok(())
}

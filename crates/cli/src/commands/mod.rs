pub mod chat;
pub mod conversations;
pub mod init;
pub mod recipes;
pub mod serve;

use souschef_config::AppConfig;
use souschef_store::SqliteStore;
use std::sync::Arc;

/// The user every local CLI session acts as.
pub const LOCAL_USER: &str = "local";

/// Open the configured SQLite store, creating the directory if needed.
pub async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    let db_path = config.storage.effective_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::new(&format!("sqlite://{}", db_path.display())).await?;
    Ok(Arc::new(store))
}

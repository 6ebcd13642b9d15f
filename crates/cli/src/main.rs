//! SousChef CLI — the main entry point.
//!
//! Commands:
//! - `init`          — Write a default config file
//! - `chat`          — Interactive chat or single-message mode
//! - `serve`         — Start the HTTP gateway
//! - `conversations` — List or delete conversations
//! - `recipes`       — List, show, or delete saved recipes

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "souschef",
    about = "SousChef — a conversational recipe assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Chat with the recipe assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Resume an existing conversation by id
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationsAction,
    },

    /// Manage saved recipes
    Recipes {
        #[command(subcommand)]
        action: RecipesAction,
    },
}

#[derive(Subcommand)]
enum ConversationsAction {
    /// List conversations
    List,
    /// Delete a conversation and its messages
    Delete { id: String },
}

#[derive(Subcommand)]
enum RecipesAction {
    /// List saved recipes
    List,
    /// Show one saved recipe
    Show { id: String },
    /// Delete a saved recipe
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Chat {
            message,
            conversation,
        } => commands::chat::run(message, conversation).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Conversations { action } => match action {
            ConversationsAction::List => commands::conversations::list().await?,
            ConversationsAction::Delete { id } => commands::conversations::delete(&id).await?,
        },
        Commands::Recipes { action } => match action {
            RecipesAction::List => commands::recipes::list().await?,
            RecipesAction::Show { id } => commands::recipes::show(&id).await?,
            RecipesAction::Delete { id } => commands::recipes::delete(&id).await?,
        },
    }

    Ok(())
}

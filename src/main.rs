use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use bedrock_chat::app;
use bedrock_chat::bedrock::BedrockClient;
use bedrock_chat::commands::{self, SettingsAction};
use bedrock_chat::config::{Settings, TomlStore};
use bedrock_chat::controller::ChatController;

#[derive(Parser)]
#[command(name = "bedrock-chat")]
#[command(version)]
#[command(about = "Terminal chat playground for the Amazon Bedrock Converse API", long_about = None)]
struct Cli {
    /// Model id to chat with (overrides the saved default)
    #[arg(long)]
    model: Option<String>,

    /// Request the complete response instead of streaming it
    #[arg(long)]
    no_stream: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or update stored credentials and preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Settings { action }) => commands::settings(action),
        None => {
            let store = TomlStore::open_default()?;
            let mut settings = Settings::from_store(&store);
            if let Some(model) = cli.model {
                settings.model_id = model;
            }
            if cli.no_stream {
                settings.streaming = false;
            }

            let client = Arc::new(BedrockClient::new(&settings)?);
            let controller = Arc::new(ChatController::new(
                client,
                settings.model_id.clone(),
                settings.streaming,
            ));
            app::run(controller).await
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing::{error, info};

mod app;
mod config;
mod controller;
mod conversation;
mod error;
mod gemini;
mod handler;
mod logging;
mod storage;
mod theme;
mod tui;
mod typing;
mod ui;

use app::App;
use config::Config;
use conversation::ChatRole;
use gemini::GeminiClient;
use storage::Store;

#[derive(Parser)]
#[command(name = "gemini-chat")]
#[command(version, about = "Chat with Gemini from the terminal")]
struct Cli {
    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name, e.g. gemini-1.5-pro
    #[arg(long, global = true, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Directory for saved chats, theme and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one prompt and print the reply
    Ask {
        /// The prompt to send
        prompt: String,
    },
    /// Print the saved conversation
    History,
    /// Delete the saved conversation
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or create the config file
    Config {
        /// Write a config file with the current settings
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?.with_overrides(cli.api_key, cli.model, cli.base_url);
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => Config::default_data_dir()?,
    };

    let _log_guard = logging::init(&data_dir, config.log_level())?;
    let store = Store::new(data_dir);
    info!(version = env!("CARGO_PKG_VERSION"), dir = %store.dir().display(), "starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config, store).await,
        Commands::Ask { prompt } => ask(&config, &prompt).await,
        Commands::History => print_history(&store),
        Commands::Clear { yes } => clear_history(&store, yes),
        Commands::Config { init } => show_config(&config, init),
    }
}

async fn run_chat(config: &Config, store: Store) -> Result<()> {
    let mut app = App::new(config, store)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(config.typing_interval());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;

    if let Err(e) = &result {
        error!(error = %e, "chat loop failed");
    }
    result
}

async fn ask(config: &Config, prompt: &str) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        anyhow::bail!("Prompt is empty");
    }

    let client = GeminiClient::from_config(config)?;
    let reply = client.generate(prompt).await?;
    println!("{}", reply);
    Ok(())
}

fn print_history(store: &Store) -> Result<()> {
    let conversation = store.load_conversation()?;
    if conversation.is_empty() {
        println!("No saved chats.");
        return Ok(());
    }

    for message in conversation.messages() {
        let label = match message.role {
            ChatRole::User => "You",
            ChatRole::Assistant => "Gemini",
        };
        println!("{}:\n{}\n", label, message.content);
    }
    Ok(())
}

fn clear_history(store: &Store, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Are you sure you want to delete all chats?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.clear_conversation()?;
    println!("Deleted all chats.");
    Ok(())
}

fn show_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::get_config_path()?;
    if init {
        config.save()?;
        println!("Wrote {}", path.display());
    } else {
        println!("Config file: {}", path.display());
        println!("Model:       {}", config.model());
        println!("Endpoint:    {}/{}", config.base_url(), config.api_version());
        println!(
            "API key:     {}",
            if config.api_key.is_some() { "set" } else { "not set" }
        );
    }
    Ok(())
}

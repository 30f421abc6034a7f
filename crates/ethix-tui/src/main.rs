use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use ethix_core::{
    BackendConfigLoader, Config, CredentialStore, JsonFileStore, KeyValueStore, MistralClient,
};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod handler;
mod tui;
mod ui;

use app::{mask_key, App, Credentials};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "ethix")]
#[command(version, about = "Terminal chat client for Ethix IA")]
struct Cli {
    /// Model to use for this run
    #[arg(long, global = true)]
    model: Option<String>,
    /// Base URL of the chat completion API
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat (default)
    Chat,
    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Fetch and print the backend service configuration
    BackendConfig {
        /// Origin serving config.json (defaults to backend_origin in the config file)
        #[arg(long)]
        origin: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Show which key is active
    Show {
        /// Print the key unmasked
        #[arg(long)]
        reveal: bool,
    },
    /// Save a custom key
    Set {
        key: String,
    },
    /// Remove the custom key and use the default
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);

    // Logging first, so a broken config file gets reported
    match command {
        Commands::Chat => init_file_logging()?,
        _ => init_stderr_logging(),
    }

    let mut config = Config::load_or_default().with_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }

    match command {
        Commands::Chat => run_chat(&config).await,
        Commands::Key { action } => run_key(action),
        Commands::BackendConfig { origin } => {
            let origin = origin
                .or(config.backend_origin)
                .ok_or_else(|| anyhow!("No origin given. Pass --origin or set backend_origin in the config file"))?;

            let loader = BackendConfigLoader::new(&origin);
            println!("{}", serde_json::to_string_pretty(loader.get().await)?);
            Ok(())
        }
    }
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=info,ethix_core=info", env!("CARGO_CRATE_NAME")).into())
}

/// The TUI owns the terminal, so chat mode logs to a file
fn init_file_logging() -> Result<()> {
    let log_path = Config::log_path()?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    tracing_subscriber::registry()
        .with(log_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_credentials() -> Result<Credentials> {
    let storage: Box<dyn KeyValueStore + Send> = Box::new(JsonFileStore::open(Config::storage_path()?)?);
    Ok(CredentialStore::load(storage, Config::default_api_key()))
}

fn run_key(action: KeyAction) -> Result<()> {
    let mut credentials = load_credentials()?;

    match action {
        KeyAction::Show { reveal } => {
            let status = if credentials.is_using_default() { "default" } else { "custom" };
            let key = if reveal {
                credentials.get().to_string()
            } else {
                mask_key(credentials.get())
            };
            println!("Using {} key: {}", status, key);
        }
        KeyAction::Set { key } => {
            credentials.set(key.trim())?;
            if credentials.is_using_default() {
                println!("Empty key given, using the default key");
            } else {
                println!("Custom key saved");
            }
        }
        KeyAction::Reset => {
            credentials.reset()?;
            println!("Custom key removed, using the default key");
        }
    }

    Ok(())
}

async fn run_chat(config: &Config) -> Result<()> {
    let credentials = load_credentials()?;
    let client = MistralClient::new(config);
    info!(model = %client.model(), endpoint = %client.endpoint(), "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(client, credentials, events.sender());

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!(turns = app.turns().len(), "chat closed");
    result
}

async fn event_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use flowchat_core::{Config, Provider};

mod app;
mod handler;
mod highlight;
mod theme;
mod tui;
mod ui;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "flowchat")]
#[command(version, about = "Terminal chat client for hosted Langflow and Gemini backends")]
struct Cli {
    /// Backend to talk to: langflow, proxy, or gemini
    #[arg(short, long, env = "FLOWCHAT_PROVIDER")]
    provider: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long, env = "FLOWCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file (stderr belongs to the UI)
    #[arg(long, env = "FLOWCHAT_LOG")]
    log: Option<PathBuf>,

    /// Write logs to the default log file
    #[arg(short, long)]
    verbose: bool,
}

fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("flowchat").join("flowchat.log"))
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// The `--config` file when given, otherwise the default location
fn resolve_config_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::get_config_path(),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Ok(Config::load_from(path)?.with_env_overrides(|name| std::env::var(name).ok()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match (&cli.log, cli.verbose) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(default_log_path()?),
        (None, false) => None,
    };
    if let Some(log_path) = &log_path {
        init_logging(log_path)?;
    }

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = load_config(&config_path)?;
    let provider = match cli.provider.as_deref() {
        Some(name) => Provider::from_str(name)
            .ok_or_else(|| anyhow!("unknown provider '{}' (expected langflow, proxy, or gemini)", name))?,
        None => config.provider(),
    };
    info!(provider = provider.as_str(), config = %config_path.display(), "starting flowchat");

    let mut app = App::new(config, provider, config_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut app, &mut terminal, &mut events).await;

    tui::restore()?;
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

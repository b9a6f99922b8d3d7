use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use snarky_core::{Collaborator, Config, HistoryStore, Provider, ProviderClient, SessionController};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

const DEFAULT_LOG_FILTER: &str = "snarky=debug,snarky_core=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = HistoryStore::default_dir()?;
    let _log_guard = init_logging(&data_dir.join("logs"))?;
    tracing::info!("Starting SnarkyAI v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Could not read config, using defaults: {}", e);
        Config::new()
    });

    let (provider, client) = match ProviderClient::from_config(config.provider(), &config) {
        Ok(client) => (config.provider(), client),
        Err(e) => {
            tracing::warn!("{}; falling back to {}", e, Provider::OpenAI.as_str());
            (Provider::OpenAI, ProviderClient::from_config(Provider::OpenAI, &config)?)
        }
    };
    tracing::info!("Provider: {}", provider.display_name());

    let store = HistoryStore::default_location()?;
    tracing::info!("Chat history: {}", store.path().display());
    let collaborator: Arc<dyn Collaborator> = Arc::new(client);
    let session = Arc::new(SessionController::new(store, collaborator));

    let mut app = App::new(session, config, provider);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    tracing::info!("SnarkyAI exiting");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

/// Log to a daily file so tracing output never draws over the terminal UI
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "snarky.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

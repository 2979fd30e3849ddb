mod logging;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logging::{LogTarget, init_tracing};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use terminal::{Choices, KeyMapper, KeyReader, TerminalDisplay, TerminalGuard};
use tracing::info;
use yacatalog::CatalogConfigExt;
use yaconfig::Config;
use yaengine::{ClockPipeline, ProcessLauncher, run_engine};
use yaplayer::PlayerApp;

#[derive(Parser)]
#[command(name = "yamusic", version, about = "Terminal client for Yandex Music")]
struct Cli {
    /// Configuration directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the playback engine on stdin/stdout (started by the player)
    Engine,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config =
        Config::load_config(cli.config.as_deref()).context("Cannot load configuration")?;

    match cli.command {
        Some(Command::Engine) => engine_main(config),
        None => player_main(config),
    }
}

fn engine_main(config: Config) -> Result<()> {
    init_tracing(&config, LogTarget::Stderr);
    let tick = config.get_engine_tick();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Cannot build engine runtime")?;
    runtime
        .block_on(run_engine(
            tokio::io::stdin(),
            tokio::io::stdout(),
            ClockPipeline::new(),
            tick,
        ))
        .context("Engine loop failed")
}

fn player_main(config: Config) -> Result<()> {
    init_tracing(&config, LogTarget::File);
    std::panic::set_hook(Box::new(|panic_info| {
        terminal::restore();
        eprintln!("\r\nyamusic panicked: {}", panic_info);
    }));

    let runtime = tokio::runtime::Runtime::new().context("Cannot build runtime")?;
    runtime.block_on(play(config))
}

async fn play(config: Config) -> Result<()> {
    info!(config_dir = %config.config_dir().display(), "Starting yamusic");
    let client = config
        .catalog_client_builder()
        .timeout(config.get_api_timeout())
        .connect()
        .await
        .context("Cannot connect to the catalog")?;
    let launcher = ProcessLauncher::current_exe(vec![
        "--config".to_string(),
        config.config_dir().display().to_string(),
    ])?;

    let choices = Arc::new(Mutex::new(Choices::default()));
    let display = Arc::new(Mutex::new(TerminalDisplay::new(choices.clone())));
    let mut app = PlayerApp::new(
        Arc::new(config),
        Arc::new(client),
        Arc::new(launcher),
        display,
    );

    let _guard = TerminalGuard::enter()?;
    let reader = KeyReader::spawn(app.sender(), KeyMapper::new(choices));
    let result = app.run().await;
    reader.stop();
    result?;
    info!("Bye");
    Ok(())
}

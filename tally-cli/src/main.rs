mod app;
mod command;
mod event;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tally_core::config::tally_dir;
use tally_core::{HttpCounterApi, NamespaceKeyDirectory, SessionResolver, TallyConfig};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use app::App;
use event::AppEvent;

#[derive(Parser)]
struct Args {
    /// Base URL of the counter service (overrides the config file)
    #[arg(long, env = "TALLY_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file to read instead of ~/.tally/config.json
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective config (to --config if given) and exit
    #[arg(long)]
    save_config: bool,
}

fn load_config(args: &Args) -> anyhow::Result<TallyConfig> {
    let mut config = match &args.config {
        Some(path) => TallyConfig::load_from(path)?,
        None => TallyConfig::load_or_default(),
    };
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(secs) = args.timeout {
        config.request_timeout_secs = secs;
    }
    Ok(config)
}

/// Persist the effective config where it was read from. Returns the path written.
fn save_config(args: &Args, config: &TallyConfig) -> anyhow::Result<PathBuf> {
    match &args.config {
        Some(path) => {
            config.save_to(path)?;
            Ok(path.clone())
        }
        None => {
            config.save()?;
            Ok(TallyConfig::config_path())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up file-based tracing (logs go to ~/.tally/tally.log)
    {
        let log_dir = tally_dir();
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("tally.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();
    let config = load_config(&args)?;

    if args.save_config {
        let path = save_config(&args, &config)?;
        eprintln!("wrote {}", path.display());
        return Ok(());
    }

    let api = Arc::new(HttpCounterApi::from_config(&config)?);
    tracing::info!("using counter service at {}", api.base_url());
    let directory = NamespaceKeyDirectory::from_history(&config.history);
    let resolver = Arc::new(SessionResolver::with_directory(api, directory));

    let (tx, rx) = mpsc::unbounded_channel();
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(AppEvent::Input(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(AppEvent::InputClosed);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("stdin read failed: {e}");
                        let _ = tx.send(AppEvent::InputClosed);
                        break;
                    }
                }
            }
        });
    }

    App::new(resolver, tx).run(rx).await
}

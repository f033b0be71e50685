mod bot;
mod command;
mod config;
mod error;
mod evaluator;
mod model;
mod notifier;
mod price;
mod store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::BotTransport;
use bot::telegram::TelegramTransport;
use command::router::CommandRouter;
use config::AppConfig;
use evaluator::AlertEvaluator;
use notifier::Notifier;
use notifier::chat::ChatNotifier;
use price::PriceSource;
use price::coingecko::CoinGeckoPriceSource;
use store::AlertStore;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("startup error")]
    Startup,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "coin-alert-bot", about = "Crypto price alert chat bot")]
struct Cli {
    /// Optional TOML configuration file; the bot token is always read from
    /// `TELEGRAM_BOT_TOKEN`.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config =
        config::load(cli.config.as_deref().map(Path::new)).change_context(AppError::Config)?;

    init_tracing(&config);

    let fetch_timeout = config.general.fetch_timeout();

    // ── Collaborators ─────────────────────────────────────────────────────────
    let store = Arc::new(AlertStore::new());
    let prices: Arc<dyn PriceSource> = Arc::new(
        CoinGeckoPriceSource::new(&config.price, fetch_timeout).change_context(AppError::Startup)?,
    );
    let telegram = TelegramTransport::new(&config.telegram).change_context(AppError::Startup)?;
    let bot_username = telegram
        .username()
        .await
        .change_context(AppError::Startup)?;
    info!(bot_username = %bot_username, "telegram bot authenticated");
    let transport: Arc<dyn BotTransport> = Arc::new(telegram);
    let notifier: Arc<dyn Notifier> = Arc::new(ChatNotifier::new(Arc::clone(&transport)));

    let router = Arc::new(CommandRouter::new(
        Arc::clone(&store),
        Arc::clone(&prices),
        fetch_timeout,
        bot_username,
    ));
    let evaluator = AlertEvaluator::new(
        Arc::clone(&store),
        Arc::clone(&prices),
        Arc::clone(&notifier),
        fetch_timeout,
    );

    // ── Tasks ─────────────────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let tick_interval = config.general.tick_interval();

    let evaluator_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { evaluator.run(tick_interval, cancel).await })
    };
    let bot_handle = tokio::spawn(bot::poll_loop(transport, router, cancel.clone()));

    info!(
        tick_interval = ?tick_interval,
        fetch_timeout = ?fetch_timeout,
        "bot is running"
    );

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    cancel.cancel();

    for handle in [evaluator_handle, bot_handle] {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    if !store.is_empty() {
        info!(discarded = store.len(), "in-memory alerts dropped on exit");
    }
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

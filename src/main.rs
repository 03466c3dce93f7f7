//! NutriCare: child nutrition screening service
//!
//! Main entry point: HTTP API plus, when a token is configured, the Telegram bot.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nutricare::adapters::sanitize::SanitizingMakeWriter;
use nutricare::adapters::sqlite::SqliteStorage;
use nutricare::adapters::telegram::TelegramClient;
use nutricare::application::AssessmentService;
use nutricare::bot::{run_bot, ChatBot};
use nutricare::config::{AppConfig, LogMode};
use nutricare::http::{run_server, HttpConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Initialize logging.
    let (writer, _guard) = match &config.log_mode {
        LogMode::File(log_file) => {
            if let Some(parent) = log_file.parent() {
                // Best-effort: don't fail startup just because the directory is missing.
                let _ = std::fs::create_dir_all(parent);
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .with_context(|| format!("Failed to open log file {log_file:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stdout => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting NutriCare...");

    let storage = Arc::new(SqliteStorage::open(&config.database).context("Failed to open database")?);
    let service = Arc::new(AssessmentService::new(storage));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bot_task = match &config.telegram_token {
        Some(token) => {
            let client = TelegramClient::new(token, config.poll_timeout)
                .context("Failed to build Telegram client")?;
            let bot = ChatBot::new(Arc::clone(&service));
            Some(tokio::spawn(run_bot(
                client,
                bot,
                config.poll_timeout,
                shutdown_rx.clone(),
            )))
        }
        None => {
            tracing::warn!("TELEGRAM_TOKEN not set; Telegram bot disabled, serving HTTP only");
            None
        }
    };

    let http_config = HttpConfig {
        listen_addr: config.listen_addr.clone(),
        body_limit_kb: config.body_limit_kb,
        request_timeout: config.request_timeout,
    };
    let mut server_task = tokio::spawn(run_server(http_config, service, shutdown_rx));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
        }
        result = &mut server_task => {
            // Server exited on its own (bind failure or fatal error).
            let _ = shutdown_tx.send(true);
            if let Some(bot) = bot_task {
                let _ = bot.await;
            }
            return result.context("HTTP server task panicked")?;
        }
    }

    let _ = shutdown_tx.send(true);
    let server_result = match server_task.await {
        Ok(result) => result.context("HTTP server failed"),
        Err(e) => Err(anyhow::Error::from(e).context("HTTP server task panicked")),
    };
    if let Some(bot) = bot_task {
        if let Err(e) = bot.await {
            tracing::error!(error = %e, "Telegram bot task panicked");
        }
    }

    server_result?;
    tracing::info!("NutriCare shutdown complete.");
    Ok(())
}

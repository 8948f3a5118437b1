use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use dot_update::config::{ServiceConfig, load_system_prompt};
use dot_update::llm::{LlmConfig, create_provider};
use dot_update::pipeline::UpdateProcessor;
use dot_update::records::{AirtableClient, RecordStore};
use dot_update::routes::update_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = ServiceConfig::from_env().context("Failed to load configuration")?;

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    // Prompt is loaded before accepting any request.
    let system_prompt = load_system_prompt(&config.prompt_path).with_context(|| {
        format!(
            "Failed to load system prompt from {}",
            config.prompt_path.display()
        )
    })?;

    eprintln!("📬 Dot Update v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Prompt: {}", config.prompt_path.display());
    eprintln!("   Airtable table: {}", config.record_store.table_url());
    eprintln!("   Listening: http://0.0.0.0:{}/update", config.port);

    // ── Clients ──────────────────────────────────────────────────────────
    let llm = create_provider(&LlmConfig {
        api_key: config.anthropic_api_key.clone(),
        model: config.model.clone(),
    })?;

    let airtable = AirtableClient::new(config.record_store.clone())
        .context("Failed to build Airtable HTTP client")?;
    if airtable.is_enabled() {
        eprintln!("   Airtable: enabled");
    } else {
        eprintln!("   Airtable: disabled (AIRTABLE_API_KEY not set, every job will be not found)");
    }
    let records: Arc<dyn RecordStore> = Arc::new(airtable);

    let processor = Arc::new(UpdateProcessor::new(records, llm, system_prompt));

    // ── Server ───────────────────────────────────────────────────────────
    let app = update_routes(processor);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Dot Update server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Dot Update server stopped");
    Ok(())
}

/// Stdout logging, plus a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "dot-update.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

//! recently-changed - Change log report for a CMS database
//!
//! Lists every record, and every raw table row, edited within a lookback
//! window. The report runs either as an HTTP task under
//! `/dev/tasks/changed-data-objects` or once from the command line.

mod config;
mod db;
mod error;
mod models;
mod registry;
mod report;
mod routes;
mod state;
mod store;

use crate::config::Settings;
use crate::db::{create_pool, PgStore};
use crate::registry::TypeRegistry;
use crate::report::{parse_days_back, ChangeReporter, Cutoff, Format, PrintSink, TASK_SLUG};
use crate::routes::create_router;
use crate::state::AppState;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "recently-changed")]
#[command(about = "Report CMS records and tables edited within the last N days")]
#[command(version)]
struct Cli {
    /// Registry file, overrides REGISTRY_PATH
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the task over HTTP (default)
    Serve,
    /// Run the report once and print it
    Run {
        /// Lookback window in days, fractions allowed
        #[arg(short, long)]
        days_back: Option<String>,

        /// Print HTML fragments instead of plain text
        #[arg(long)]
        html: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut settings = Settings::load()?;
    if let Some(path) = cli.registry {
        settings.report.registry_path = path;
    }
    info!("📋 Configuration loaded successfully");

    let reporter = build_reporter(&settings).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&settings, reporter).await,
        Commands::Run { days_back, html } => {
            let days_back =
                parse_days_back(days_back.as_deref(), settings.report.default_days_back);
            let cutoff = Cutoff::resolve(days_back);
            let format = if html { Format::Html } else { Format::Text };

            let mut sink = PrintSink::new(format);
            let summary = reporter.run(&cutoff, &mut sink).await?;
            info!(
                "✅ {} done: {} records, {} raw rows",
                TASK_SLUG, summary.changed_records, summary.changed_rows
            );
            Ok(())
        }
    }
}

/// Initialize tracing with structured logging.
/// Logs go to stderr so `run` output on stdout stays clean.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,recently_changed=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Load the registry and connect the store
async fn build_reporter(settings: &Settings) -> anyhow::Result<ChangeReporter<PgStore>> {
    let (registry, skip) = TypeRegistry::load(&settings.report.registry_path)?;
    info!(
        "📚 {} record types registered from {}",
        registry.subtypes().count(),
        settings.report.registry_path.display()
    );

    let pool = create_pool(&settings.database)?;
    let store = PgStore::new(pool, settings.database.schema.clone());
    store.verify().await?;
    info!("✅ Database pool created successfully");

    Ok(ChangeReporter::new(store, registry, skip))
}

async fn serve(settings: &Settings, reporter: ChangeReporter<PgStore>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(reporter, settings.report.default_days_back));
    let app = create_router(state);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("🌐 Server listening on http://{}", addr);
    info!("   GET /dev/tasks/{}?daysBack=30", TASK_SLUG);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}

mod config;
mod server;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docketwatch_host::{Service, spawn_scheduler};
use tracing_subscriber::EnvFilter;

use config::{ServeArgs, Settings};
use server::AllowList;

/// Track CourtListener dockets that mention watch-listed entities.
#[derive(Parser)]
#[command(name = "docketwatch", version, about)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one refresh cycle and print its summary.
    Refresh,
    /// Print the stored case list as JSON.
    Cases,
    /// Serve the case list and webhook, refreshing on a schedule.
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.settings.log_file.as_deref())?;
    tracing::info!("docketwatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Refresh => cmd_refresh(&cli.settings).await,
        Command::Cases => cmd_cases(&cli.settings),
        Command::Serve(args) => cmd_serve(&cli.settings, &args).await,
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating log directory {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

async fn cmd_refresh(settings: &Settings) -> anyhow::Result<()> {
    let pipeline = settings.open_pipeline()?;
    let summary = pipeline.refresh().await.context("refresh failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_cases(settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_case_store()?;
    println!("{}", serde_json::to_string_pretty(&store.all().to_vec())?);
    Ok(())
}

async fn cmd_serve(settings: &Settings, args: &ServeArgs) -> anyhow::Result<()> {
    let pipeline = settings.open_pipeline()?;
    let (service, worker) = Service::new(pipeline);

    let worker_handle = tokio::spawn(worker.run());
    let scheduler = spawn_scheduler(service.clone(), args.refresh_interval());

    let allow = AllowList::new(args.allowed_ips());
    let cors = server::cors_layer(args.cors_origins()?);
    let app = server::router(service, allow, cors);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    tracing::info!(addr = %args.listen, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
    })
    .await
    .context("HTTP server failed")?;

    // Dropping the scheduler's service handle closes the refresh channel, so the
    // worker stops after any cycle in flight.
    scheduler.abort();
    let _ = scheduler.await;
    worker_handle.await.context("refresh worker panicked")?;
    Ok(())
}

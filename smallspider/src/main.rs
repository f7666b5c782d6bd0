//! # smallspider
//!
//! Serves the SmallSpider blog admin.
//!
//! ```bash
//! smallspider runserver --addr 0.0.0.0:8000
//! smallspider --config prod.toml check
//! ```
//!
//! Settings come from `--config`, else `smallspider.toml` in the working
//! directory when it exists, else the defaults; `SMALLSPIDER_*` environment
//! variables override all three.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use smallspider_blog::bootstrap;
use smallspider_core::checks::{check_settings, CheckMessage};
use smallspider_core::logging::setup_logging;
use smallspider_core::{settings_loader, Settings};
use tower_http::trace::TraceLayer;

const DEFAULT_CONFIG: &str = "smallspider.toml";

#[derive(Debug, Parser)]
#[command(name = "smallspider", version, about = "SmallSpider blog administration server")]
struct Cli {
    /// TOML settings file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serves the admin over HTTP until interrupted.
    Runserver {
        /// Address to bind, overriding `bind_addr`.
        #[arg(long, value_name = "ADDR")]
        addr: Option<String>,
    },
    /// Checks the settings and the admin registrations.
    Check,
}

fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    match config {
        Some(path) => settings_loader::from_toml_file_with_env(path)
            .with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            settings_loader::from_toml_file_with_env(DEFAULT_CONFIG)
                .with_context(|| format!("loading {DEFAULT_CONFIG}"))
        }
        None => Ok(settings_loader::from_env()),
    }
}

/// Settings checks followed by the admin registration checks.
async fn run_checks(settings: &Settings) -> anyhow::Result<Vec<CheckMessage>> {
    let mut messages = check_settings(settings);
    let site = bootstrap(settings).await?;
    messages.extend(site.check());
    Ok(messages)
}

fn serious_count(messages: &[CheckMessage]) -> usize {
    messages.iter().filter(|m| m.is_serious()).count()
}

async fn check(settings: &Settings) -> anyhow::Result<()> {
    let messages = run_checks(settings).await?;
    for message in &messages {
        println!("{message}");
    }
    let errors = serious_count(&messages);
    if errors > 0 {
        bail!("System check identified {errors} error(s).");
    }
    println!(
        "System check identified {} issue(s) (0 silenced).",
        messages.len()
    );
    Ok(())
}

async fn runserver(mut settings: Settings, addr: Option<String>) -> anyhow::Result<()> {
    if let Some(addr) = addr {
        settings.bind_addr = addr;
    }

    let messages = check_settings(&settings);
    for message in &messages {
        tracing::warn!(check = ?message.id, "{message}");
    }
    let errors = serious_count(&messages);
    if errors > 0 {
        bail!("refusing to start: {errors} settings error(s)");
    }
    let addr = settings.socket_addr()?;

    let site = bootstrap(&settings).await?;
    for message in site.check() {
        tracing::warn!(check = ?message.id, "{message}");
    }
    let models = site.registered_models().join(", ");
    let app = site.into_axum_router().layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        %addr,
        prefix = %settings.admin.url_prefix,
        models = %models,
        "SmallSpider admin listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    setup_logging(&settings);

    match cli.command {
        Command::Runserver { addr } => runserver(settings, addr).await,
        Command::Check => check(&settings).await,
    }
}

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
pub use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    init_tracing(&config);

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve" | "-s" | "--serve") => {
            config.validate()?;
            run_server(config).await
        }

        Some("migrate" | "-m" | "--migrate") => cmd_migrate(&config).await,

        Some("hash-password") => cmd_hash_password(&config, args.get(2).map(String::as_str)),

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            print_help();
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_help() {
    println!("usagelog - AI tool usage log");
    println!();
    println!("Usage: usagelog [command]");
    println!();
    println!("Commands:");
    println!("  serve                    Run the HTTP API (default)");
    println!("  migrate                  Run the storage migration and exit");
    println!("  hash-password [secret]   Print an Argon2 hash for [[auth.users]]");
    println!("                           (reads stdin when no secret is given)");
    println!("  help                     Show this message");
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let port = config.server.port;
    let state = api::create_app_state_from_config(config).await?;
    info!(
        "Storage backend: {}, {} entries",
        state.storage().kind(),
        state.storage().count().await?
    );

    let app = api::router(Arc::clone(&state));
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let choices = Arc::new(config.choices.clone());
    let storage = storage::Storage::open(&config.storage, choices).await?;
    println!(
        "Migration complete: {} backend, {} entries",
        storage.kind(),
        storage.count().await?
    );
    Ok(())
}

fn cmd_hash_password(config: &Config, secret: Option<&str>) -> anyhow::Result<()> {
    let secret = match secret {
        Some(secret) => secret.to_string(),
        None => {
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if secret.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    println!("{}", services::hash_password(&secret, &config.security)?);
    Ok(())
}

use std::sync::Arc;

use clap::Parser;
use deskmate_core::config::CorpusKind;
use deskmate_core::{DeskmateConfig, API_KEY_ENV};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use deskmate_server::{server, AppServices};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "deskmate.toml")]
    config: String,

    /// Check configuration and database connectivity, then exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match DeskmateConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins, otherwise service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.health {
        return run_health_check(&config).await;
    }

    let api_key = std::env::var(API_KEY_ENV).ok();
    let services = Arc::new(AppServices::from_config(config, api_key.as_deref()).await?);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Expired rate-limit windows, idle conversations and old resolved escalations
    let sweep_services = services.clone();
    let mut sweep_shutdown = tx.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_services.config.retention.sweep_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => sweep_services.sweep(),
                _ = sweep_shutdown.recv() => break,
            }
        }
    });

    // Spawn HTTP REST API server if enabled
    if services.config.http.enabled {
        let http_services = services.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = deskmate_server::http::start_http_server(http_services, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = services.config.service.socket_path.clone();
    server::run_unix_server(&socket_path, services, tx.subscribe()).await?;

    Ok(())
}

async fn run_health_check(config: &DeskmateConfig) -> anyhow::Result<()> {
    println!("✅ Config loaded (corpus provider: {:?})", config.corpus.provider);

    if config.corpus.provider == CorpusKind::Postgres {
        let Some(db) = &config.database else {
            println!("❌ corpus.provider = \"postgres\" but no [database] section");
            std::process::exit(1);
        };

        let pool = match deskmate_core::db::create_pool(db).await {
            Ok(p) => p,
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        };

        match deskmate_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL health check failed: {}", e);
                std::process::exit(1);
            }
        }

        match deskmate_core::db::check_pgvector(&pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    match std::env::var(API_KEY_ENV) {
        Ok(k) if !k.trim().is_empty() => println!("✅ {} set, embedding and generation enabled", API_KEY_ENV),
        _ => println!("⚠️  {} not set, answers will use templated fallback", API_KEY_ENV),
    }

    println!("✅ Deskmate health check passed");
    Ok(())
}

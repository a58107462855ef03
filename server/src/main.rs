use std::process::ExitCode;

use anyhow::Context;
use doctors_portal::{app::AppState, config::Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "doctors_portal=debug,tower_http=debug";

#[tokio::main]
async fn main() -> ExitCode {
    // Loaded before the subscriber so RUST_LOG from .env applies.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("reading configuration")?;

    let app_state = AppState::new(&config)
        .await
        .context("building the database client")?;

    app_state
        .ping()
        .await
        .context("connecting to the database")?;
    tracing::info!("connected to database {}", config.database_name);

    app_state
        .run_migration()
        .await
        .context("running migrations")?;

    let app = doctors_portal::api::router(app_state.clone());

    tracing::info!("listening on {}", config.bind_address);

    axum::Server::try_bind(&config.bind_address)
        .with_context(|| format!("binding {}", config.bind_address))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    tracing::info!("shutting down");
    app_state.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

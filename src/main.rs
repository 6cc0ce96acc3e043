use clap::Parser;
use fraudpay_core::cli::{Cli, Commands, DbCommands};
use fraudpay_core::config::{Config, LogFormat};
use fraudpay_core::{build_state, cli, create_app, startup};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let args = Cli::parse();

    match args.command {
        Some(Commands::Serve) | None => serve(Config::from_env()?).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&Config::from_env()?).await,
        Some(Commands::Config) => cli::handle_config_validate(&Config::from_env()?),
        Some(Commands::Token { user_id }) => cli::handle_token(&Config::from_env()?, &user_id),
        Some(Commands::Submit {
            recipient,
            amount,
            remote,
        }) => cli::handle_submit(&remote, &recipient, &amount).await,
        Some(Commands::Approve { id, remote }) => cli::handle_approve(&remote, &id).await,
        Some(Commands::List { remote }) => cli::handle_list(&remote).await,
        Some(Commands::Watch { full_refresh }) => {
            cli::handle_watch(&Config::from_env()?, full_refresh).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;

    let report = startup::validate_environment(&config, state.store.as_ref()).await;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

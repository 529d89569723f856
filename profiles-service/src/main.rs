use anyhow::Context;
use clap::{Parser, Subcommand};
use profiles_service::config::{load_clients, ProfilesConfig};
use profiles_service::repositories::{self, PgProfileRepository, PgTokenRepository};
use profiles_service::services::ids::random_id_generator;
use profiles_service::services::{
    LoggingEventPublisher, OrcidApi, OrcidApiClient, UriSigner, WebhookMaintainer,
};
use profiles_service::{build_router, commands, commit_hooks, AppState};
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Debug, Parser)]
#[command(name = "profiles-service", version, about = "ORCID-backed profiles service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Delete every profile and stored ORCID token
    Clear,
    /// Create a profile without an ORCID iD
    CreateProfile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Register ORCID webhooks for every linked profile
    SetOrcidWebhooks,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

/// Fill in the service tokens the configuration leaves out.
async fn resolve_service_tokens(
    config: &mut ProfilesConfig,
    orcid_client: &dyn OrcidApi,
) -> anyhow::Result<()> {
    if config.orcid.webhook_access_token.is_none() {
        let token = orcid_client
            .request_access_token("/webhook")
            .await
            .context("Failed to obtain ORCID webhook token")?;
        config.orcid.webhook_access_token = Some(token);
    }

    if config.orcid.read_public_access_token.is_none() {
        let token = orcid_client
            .request_access_token("/read-public")
            .await
            .context("Failed to obtain ORCID read-public token")?;
        config.orcid.read_public_access_token = Some(token);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ProfilesConfig::load().context("Failed to load configuration")?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(environment = ?config.environment, "Starting {}", config.service_name);

    let pool = repositories::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let orcid_client: Arc<dyn OrcidApi> =
        Arc::new(OrcidApiClient::new(&config.orcid, config.retry.policy())?);

    let command = cli.command.unwrap_or(Command::Serve);

    if matches!(command, Command::Serve | Command::SetOrcidWebhooks) {
        resolve_service_tokens(&mut config, orcid_client.as_ref()).await?;
    }

    let hooks = commit_hooks(
        &config,
        orcid_client.clone(),
        Arc::new(LoggingEventPublisher),
    );
    let profiles = Arc::new(PgProfileRepository::new(
        pool.clone(),
        hooks,
        random_id_generator(),
    ));
    let orcid_tokens = Arc::new(PgTokenRepository::new(pool));

    match command {
        Command::Clear => {
            commands::clear(profiles.as_ref(), orcid_tokens.as_ref()).await?;
        }
        Command::CreateProfile { name, email } => {
            let profile = commands::create_profile(profiles.as_ref(), &name, &email).await?;
            println!("{}", profile.id);
        }
        Command::SetOrcidWebhooks => {
            let maintainer = WebhookMaintainer::new(
                orcid_client,
                UriSigner::new(&config.webhook.secret),
                config.webhook_base_url(),
                config.orcid.webhook_access_token.clone(),
            );
            let registered = commands::set_orcid_webhooks(profiles.as_ref(), &maintainer).await?;
            println!("Registered {} webhooks", registered);
        }
        Command::Serve => {
            let clients = load_clients(&config.clients_file)?;

            let port = config.port;
            let state = AppState::new(config, clients, profiles, orcid_tokens, orcid_client);
            let app = build_router(state)?;

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            tracing::info!("Listening on port {}", port);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

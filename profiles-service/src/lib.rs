pub mod commands;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use axum::{
    http::Request,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ProfilesConfig;
use crate::models::Clients;
use crate::repositories::{ProfileRepository, TokenRepository};
use crate::services::{
    CommitHooks, EventPublisher, OrcidApi, ProfileReconciler, SendUpdateEvents, TokenExchanger,
    UriSigner, WebhookMaintainer,
};

#[derive(Clone)]
pub struct AppState {
    pub config: ProfilesConfig,
    pub clients: Arc<Clients>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub orcid_tokens: Arc<dyn TokenRepository>,
    pub orcid_client: Arc<dyn OrcidApi>,
    pub uri_signer: UriSigner,
    pub reconciler: ProfileReconciler,
    pub token_exchanger: TokenExchanger,
}

impl AppState {
    pub fn new(
        config: ProfilesConfig,
        clients: Clients,
        profiles: Arc<dyn ProfileRepository>,
        orcid_tokens: Arc<dyn TokenRepository>,
        orcid_client: Arc<dyn OrcidApi>,
    ) -> Self {
        let uri_signer = UriSigner::new(&config.webhook.secret);
        let reconciler = ProfileReconciler::new(profiles.clone());
        let token_exchanger = TokenExchanger::new(orcid_client.clone(), config.callback_uri());

        Self {
            config,
            clients: Arc::new(clients),
            profiles,
            orcid_tokens,
            orcid_client,
            uri_signer,
            reconciler,
            token_exchanger,
        }
    }
}

/// Hooks run after every committed profile write: webhook upkeep first, then
/// change events.
pub fn commit_hooks(
    config: &ProfilesConfig,
    orcid_client: Arc<dyn OrcidApi>,
    publisher: Arc<dyn EventPublisher>,
) -> CommitHooks {
    let maintainer = WebhookMaintainer::new(
        orcid_client,
        UriSigner::new(&config.webhook.secret),
        config.webhook_base_url(),
        config.orcid.webhook_access_token.clone(),
    );

    CommitHooks::new(vec![
        Arc::new(maintainer),
        Arc::new(SendUpdateEvents::new(publisher)),
    ])
}

async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("The requested resource was not found"))
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let app = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/oauth2/authorize", get(handlers::oauth::authorize))
        .route("/oauth2/check", get(handlers::oauth::check))
        .route("/oauth2/token", post(handlers::oauth::token))
        .route("/orcid-webhook/:payload", post(handlers::webhook::update))
        .route("/profiles", get(handlers::profiles::list))
        .route("/profiles/:id", get(handlers::profiles::get))
        .fallback(not_found)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        );

    Ok(app)
}

//! Test helpers for profiles-service integration tests.
//!
//! Builds the router over in-memory repositories and a mock ORCID API.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use profiles_service::{
    build_router, commit_hooks,
    config::{
        DatabaseConfig, Environment, OrcidConfig, ProfilesConfig, RetryConfig, WebhookConfig,
    },
    models::{Client, Clients},
    repositories::{InMemoryProfileRepository, InMemoryTokenRepository},
    services::{
        ids::{random_id_generator, IdGenerator},
        MockEventPublisher, MockOrcidApi,
    },
    AppState,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const CLIENT_ID: &str = "journal--client-id";
pub const CLIENT_SECRET: &str = "journal--client-secret";
pub const REDIRECT_URI: &str = "http://www.example.com/client/redirect";
pub const OTHER_REDIRECT_URI: &str = "http://www.example.com/client/other";
pub const WEBHOOK_SECRET: &str = "webhook-secret";
pub const READ_PUBLIC_TOKEN: &str = "read-public-token";

/// Yields the given IDs in order, then repeats the last one.
pub fn sequence_generator(ids: Vec<&str>) -> IdGenerator {
    let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
    let next = AtomicUsize::new(0);

    Arc::new(move || {
        let index = next.fetch_add(1, Ordering::SeqCst);
        ids.get(index).or_else(|| ids.last()).cloned().unwrap_or_default()
    })
}

pub fn test_config() -> ProfilesConfig {
    ProfilesConfig {
        environment: Environment::Ci,
        service_name: "profiles".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        port: 8080,
        public_url: "http://localhost".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        orcid: OrcidConfig {
            api_uri: "http://www.example.com/api".to_string(),
            authorize_uri: "http://www.example.com/oauth/authorize".to_string(),
            token_uri: "http://www.example.com/oauth/token".to_string(),
            client_id: "orcid-client-id".to_string(),
            client_secret: "orcid-client-secret".to_string(),
            webhook_access_token: Some("webhook-token".to_string()),
            read_public_access_token: Some(READ_PUBLIC_TOKEN.to_string()),
        },
        webhook: WebhookConfig {
            secret: WEBHOOK_SECRET.to_string(),
        },
        retry: RetryConfig { max_attempts: 1 },
        clients_file: "clients.yaml".to_string(),
    }
}

pub fn test_clients() -> Clients {
    Clients::new(vec![Client {
        name: "journal".to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        redirect_uris: vec![REDIRECT_URI.to_string(), OTHER_REDIRECT_URI.to_string()],
    }])
}

/// Application under test plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub config: ProfilesConfig,
    pub profiles: Arc<InMemoryProfileRepository>,
    pub orcid_tokens: Arc<InMemoryTokenRepository>,
    pub orcid: Arc<MockOrcidApi>,
    pub events: Arc<MockEventPublisher>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_id_generator(random_id_generator())
    }

    pub fn with_id_generator(id_generator: IdGenerator) -> Self {
        let config = test_config();
        let orcid = Arc::new(MockOrcidApi::new());
        let events = Arc::new(MockEventPublisher::default());

        let hooks = commit_hooks(&config, orcid.clone(), events.clone());
        let profiles = Arc::new(InMemoryProfileRepository::new(hooks, id_generator));
        let orcid_tokens = Arc::new(InMemoryTokenRepository::new());

        let state = AppState::new(
            config.clone(),
            test_clients(),
            profiles.clone(),
            orcid_tokens.clone(),
            orcid.clone(),
        );
        let router = build_router(state).unwrap();

        Self {
            router,
            config,
            profiles,
            orcid_tokens,
            orcid,
            events,
        }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> Response {
        let body = serde_urlencoded::to_string(form).unwrap();

        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string()
}

/// Query parameters of a redirect target, in order.
pub fn query_params(uri: &str) -> Vec<(String, String)> {
    let query = uri.split_once('?').map(|(_, query)| query).unwrap_or_default();
    serde_urlencoded::from_str(query).unwrap()
}

pub fn query_param(uri: &str, name: &str) -> Option<String> {
    query_params(uri)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

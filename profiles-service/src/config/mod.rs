use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::http::RetryPolicy;
use std::collections::BTreeMap;

use crate::models::client::{ClientEntry, Clients};

/// Stem of the optional settings file (`configuration.yaml`, `.toml`, ...).
pub const SETTINGS_FILE: &str = "configuration";

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL, used for the OAuth2 callback and
    /// webhook URIs.
    pub public_url: String,
    pub database: DatabaseConfig,
    pub orcid: OrcidConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_clients_file")]
    pub clients_file: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Ci,
    Prod,
    ContinuumTest,
    End2End,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrcidConfig {
    pub api_uri: String,
    pub authorize_uri: String,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Requested with the `/webhook` scope at startup when absent.
    #[serde(default)]
    pub webhook_access_token: Option<String>,
    /// Requested with the `/read-public` scope at startup when absent.
    #[serde(default)]
    pub read_public_access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

fn default_service_name() -> String {
    "profiles".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_clients_file() -> String {
    "clients.yaml".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    3
}

impl ProfilesConfig {
    pub fn load() -> Result<Self, AppError> {
        let config: ProfilesConfig = core_config::load_settings(SETTINGS_FILE)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.webhook.secret.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "webhook.secret must not be empty"
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "retry.max_attempts must be at least 1"
            )));
        }

        if self.environment == Environment::Prod && !self.public_url.starts_with("https://") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "public_url must use https in prod"
            )));
        }

        Ok(())
    }

    fn base_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Where the provider sends users back to after authorizing.
    pub fn callback_uri(&self) -> String {
        format!("{}/oauth2/check", self.base_url())
    }

    pub fn webhook_base_url(&self) -> &str {
        self.base_url()
    }
}

/// Load the OAuth2 clients file: a map of client name to credentials and
/// redirect URIs.
pub fn load_clients(path: &str) -> Result<Clients, AppError> {
    let entries: BTreeMap<String, ClientEntry> = core_config::load_file(path)?;
    let clients = Clients::from_entries(entries);

    tracing::info!(path = %path, clients = clients.len(), "OAuth2 clients loaded");
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> ProfilesConfig {
        ProfilesConfig {
            environment: Environment::Prod,
            service_name: default_service_name(),
            log_level: default_log_level(),
            otlp_endpoint: None,
            port: default_port(),
            public_url: "https://profiles.example.com/".to_string(),
            database: DatabaseConfig {
                url: "postgres://localhost/profiles".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            orcid: OrcidConfig {
                api_uri: "https://api.orcid.org".to_string(),
                authorize_uri: "https://orcid.org/oauth/authorize".to_string(),
                token_uri: "https://orcid.org/oauth/token".to_string(),
                client_id: "APP-0000".to_string(),
                client_secret: "secret".to_string(),
                webhook_access_token: None,
                read_public_access_token: None,
            },
            webhook: WebhookConfig {
                secret: "webhook-secret".to_string(),
            },
            retry: RetryConfig::default(),
            clients_file: default_clients_file(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());

        let mut insecure = config();
        insecure.public_url = "http://profiles.example.com".to_string();
        assert!(insecure.validate().is_err());
        insecure.environment = Environment::Dev;
        assert!(insecure.validate().is_ok());

        let mut no_retries = config();
        no_retries.retry.max_attempts = 0;
        assert!(no_retries.validate().is_err());

        let mut no_secret = config();
        no_secret.webhook.secret = " ".to_string();
        assert!(no_secret.validate().is_err());
    }

    #[test]
    fn test_callback_uri() {
        assert_eq!(
            config().callback_uri(),
            "https://profiles.example.com/oauth2/check"
        );
    }

    #[test]
    fn test_load_clients() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "journal:\n  client_id: journal--client-id\n  client_secret: journal--secret\n  redirect_uris:\n    - http://localhost/check\n    - http://localhost/other\nlegacy:\n  client_id: legacy--client-id\n  client_secret: legacy--secret\n  redirect_uri: http://legacy/check\n"
        )
        .unwrap();

        let clients = load_clients(file.path().to_str().unwrap()).unwrap();

        assert_eq!(clients.len(), 2);
        assert_eq!(
            clients.find("journal--client-id").unwrap().redirect_uris,
            vec!["http://localhost/check", "http://localhost/other"]
        );
        assert_eq!(
            clients
                .find("legacy--client-id")
                .unwrap()
                .canonical_redirect_uri(),
            Some("http://legacy/check")
        );
    }
}

use serde_json::Value;
use std::sync::Arc;

use super::error::ServiceError;
use super::orcid::OrcidApi;

/// The subset of the provider's token response passed on to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub orcid: String,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct TokenExchanger {
    orcid: Arc<dyn OrcidApi>,
    redirect_uri: String,
}

impl TokenExchanger {
    /// `redirect_uri` is this service's own callback, which the provider
    /// expects to see again when the code is redeemed.
    pub fn new(orcid: Arc<dyn OrcidApi>, redirect_uri: String) -> Self {
        Self {
            orcid,
            redirect_uri,
        }
    }

    pub async fn exchange(&self, code: &str) -> Result<ExchangedToken, ServiceError> {
        let response = self
            .orcid
            .exchange_authorization_code(code, &self.redirect_uri)
            .await?;

        parse_token_response(&response)
    }
}

pub fn parse_token_response(response: &Value) -> Result<ExchangedToken, ServiceError> {
    let string = |key: &str| {
        response
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::UpstreamContract(format!("missing {}", key)))
    };

    let token_type = string("token_type")?;
    if !token_type.eq_ignore_ascii_case("bearer") {
        return Err(ServiceError::UpstreamContract(format!(
            "unsupported token_type {}",
            token_type
        )));
    }

    let expires_in = response
        .get("expires_in")
        .and_then(Value::as_i64)
        .ok_or_else(|| ServiceError::UpstreamContract("missing expires_in".to_string()))?;

    Ok(ExchangedToken {
        access_token: string("access_token")?,
        expires_in,
        token_type,
        orcid: string("orcid")?,
        name: response
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
    })
}

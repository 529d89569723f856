//! OAuth2 error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use service_core::error::AppError;
use std::fmt;

use crate::services::ServiceError;
use crate::utils::{found, with_query};

/// Error codes from RFC 6749 sections 4.1.2.1 and 5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidScope,
}

impl OAuth2ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuth2ErrorCode::InvalidRequest => "invalid_request",
            OAuth2ErrorCode::InvalidClient => "invalid_client",
            OAuth2ErrorCode::InvalidGrant => "invalid_grant",
            OAuth2ErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            OAuth2ErrorCode::UnsupportedResponseType => "unsupported_response_type",
            OAuth2ErrorCode::InvalidScope => "invalid_scope",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            OAuth2ErrorCode::InvalidClient => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OAuth2ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token endpoint error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuth2Error {
    pub error: OAuth2ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuth2Error {
    pub fn new(error: OAuth2ErrorCode) -> Self {
        Self {
            error,
            error_description: None,
        }
    }

    pub fn with_description(error: OAuth2ErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        tracing::info!(error = %self.error, description = ?self.error_description, "OAuth2 token request rejected");
        (self.error.http_status(), Json(self)).into_response()
    }
}

/// An authorization error reported back to the client's redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRedirectError {
    pub redirect_uri: String,
    pub error: OAuth2ErrorCode,
    pub error_description: Option<String>,
}

impl ClientRedirectError {
    pub fn new(redirect_uri: &str, error: OAuth2ErrorCode) -> Self {
        Self {
            redirect_uri: redirect_uri.to_string(),
            error,
            error_description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }
}

impl IntoResponse for ClientRedirectError {
    fn into_response(self) -> Response {
        let mut params = vec![("error", self.error.as_str().to_string())];
        if let Some(description) = self.error_description {
            params.push(("error_description", description));
        }

        match with_query(&self.redirect_uri, &params) {
            Ok(location) => found(&location),
            Err(err) => err.into_response(),
        }
    }
}

/// Errors from the authorization endpoint: either no client redirect is
/// known yet, or the client is told through its redirect URI.
#[derive(Debug)]
pub enum AuthorizeError {
    Invalid(AppError),
    Client(ClientRedirectError),
}

impl From<AppError> for AuthorizeError {
    fn from(err: AppError) -> Self {
        AuthorizeError::Invalid(err)
    }
}

impl From<ClientRedirectError> for AuthorizeError {
    fn from(err: ClientRedirectError) -> Self {
        AuthorizeError::Client(err)
    }
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        match self {
            AuthorizeError::Invalid(err) => err.into_response(),
            AuthorizeError::Client(err) => err.into_response(),
        }
    }
}

/// Errors from the token endpoint.
#[derive(Debug)]
pub enum TokenError {
    OAuth2(OAuth2Error),
    Internal(AppError),
}

impl From<OAuth2Error> for TokenError {
    fn from(err: OAuth2Error) -> Self {
        TokenError::OAuth2(err)
    }
}

impl From<AppError> for TokenError {
    fn from(err: AppError) -> Self {
        TokenError::Internal(err)
    }
}

impl From<ServiceError> for TokenError {
    fn from(err: ServiceError) -> Self {
        TokenError::Internal(err.into())
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        match self {
            TokenError::OAuth2(err) => err.into_response(),
            TokenError::Internal(err) => err.into_response(),
        }
    }
}

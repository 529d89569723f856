//! OAuth2 authorization-code proxy in front of ORCID.
//!
//! - `/oauth2/authorize` validates the client and sends the user to ORCID
//! - `/oauth2/check` receives ORCID's answer and hands it to the client
//! - `/oauth2/token` redeems the code and links the ORCID iD to a profile

pub mod errors;

use axum::{
    extract::{Query, State},
    response::Response,
    Form, Json,
};
use service_core::error::AppError;

use crate::dtos::oauth::{
    AuthorizationState, AuthorizeQuery, CheckQuery, TokenRequest, TokenResponse,
};
use crate::models::{Name, OrcidToken, Profile};
use crate::services::{ExchangedToken, ServiceError};
use crate::utils::{found, with_query};
use crate::AppState;
use errors::{AuthorizeError, ClientRedirectError, OAuth2Error, OAuth2ErrorCode, TokenError};

/// Scope requested from ORCID on behalf of every client.
pub const AUTHENTICATE_SCOPE: &str = "/authenticate";

/// Start an authorization.
///
/// GET /oauth2/authorize
#[tracing::instrument(skip_all, fields(client_id = ?query.client_id))]
pub async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AuthorizeError> {
    let client = query
        .client_id
        .as_deref()
        .and_then(|client_id| state.clients.find(client_id))
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid client_id")))?;

    let redirect_uri = match query.redirect_uri.as_deref() {
        Some(uri) if client.has_redirect_uri(uri) => uri,
        Some(_) => return Err(AppError::BadRequest(anyhow::anyhow!("Invalid redirect_uri")).into()),
        None => client
            .canonical_redirect_uri()
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid redirect_uri")))?,
    };

    let response_type = match query.response_type.as_deref() {
        None | Some("") => {
            return Err(ClientRedirectError::new(redirect_uri, OAuth2ErrorCode::InvalidRequest)
                .with_description("Missing response_type")
                .into())
        }
        Some("code") => "code",
        Some(_) => {
            return Err(ClientRedirectError::new(
                redirect_uri,
                OAuth2ErrorCode::UnsupportedResponseType,
            )
            .into())
        }
    };

    if query.scope.as_deref().is_some_and(|scope| !scope.is_empty()) {
        return Err(ClientRedirectError::new(redirect_uri, OAuth2ErrorCode::InvalidScope).into());
    }

    let authorization_state = AuthorizationState {
        client_id: client.client_id.clone(),
        original: query.state,
        redirect_uri: redirect_uri.to_string(),
    };
    let state_json = serde_json::to_string(&authorization_state).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Failed to serialize state: {}", e))
    })?;

    let callback_uri = state.config.callback_uri();
    let location = with_query(
        &state.config.orcid.authorize_uri,
        &[
            ("client_id", state.config.orcid.client_id.as_str()),
            ("response_type", response_type),
            ("scope", AUTHENTICATE_SCOPE),
            ("redirect_uri", callback_uri.as_str()),
            ("state", state_json.as_str()),
        ],
    )?;

    tracing::info!(client = %client.name, "Redirecting to ORCID for authorization");
    Ok(found(&location))
}

/// Return ORCID's answer to the client.
///
/// GET /oauth2/check
#[tracing::instrument(skip_all)]
pub async fn check(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> Result<Response, AppError> {
    if query.code.is_none() && query.error.is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid code")));
    }

    let authorization_state: AuthorizationState = query
        .state
        .as_deref()
        .and_then(|state| serde_json::from_str(state).ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid state")))?;

    let client = state
        .clients
        .find(&authorization_state.client_id)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid state (client_id)")))?;

    if !client.has_redirect_uri(&authorization_state.redirect_uri) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid state (redirect_uri)"
        )));
    }

    if let Some(error) = query.error.as_deref() {
        tracing::info!(client = %client.name, error = %error, "ORCID authorization failed");
    }

    let params: Vec<(&str, &str)> = [
        ("code", query.code.as_deref()),
        ("error", query.error.as_deref()),
        ("error_description", query.error_description.as_deref()),
        ("state", authorization_state.original.as_deref()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|value| (key, value)))
    .collect();

    let location = with_query(&authorization_state.redirect_uri, &params)?;
    Ok(found(&location))
}

/// Redeem an authorization code.
///
/// POST /oauth2/token
#[tracing::instrument(skip_all, fields(client_id = ?request.client_id))]
pub async fn token(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, TokenError> {
    let client = request
        .client_id
        .as_deref()
        .and_then(|client_id| state.clients.find(client_id))
        .ok_or_else(|| OAuth2Error::new(OAuth2ErrorCode::InvalidClient))?;

    if request.client_secret.as_deref() != Some(client.client_secret.as_str()) {
        return Err(OAuth2Error::new(OAuth2ErrorCode::InvalidClient).into());
    }

    if !request
        .redirect_uri
        .as_deref()
        .is_some_and(|uri| client.has_redirect_uri(uri))
    {
        return Err(OAuth2Error::with_description(
            OAuth2ErrorCode::InvalidRequest,
            "Invalid redirect_uri",
        )
        .into());
    }

    if request.grant_type.as_deref() != Some("authorization_code") {
        return Err(OAuth2Error::new(OAuth2ErrorCode::UnsupportedGrantType).into());
    }

    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OAuth2Error::new(OAuth2ErrorCode::InvalidGrant))?;

    let exchanged = state.token_exchanger.exchange(code).await?;
    let profile = link_profile(&state, &exchanged).await?;

    tracing::info!(
        client = %client.name,
        profile_id = %profile.id,
        orcid = %exchanged.orcid,
        "Authorization code redeemed"
    );

    Ok(Json(TokenResponse {
        access_token: exchanged.access_token,
        expires_in: exchanged.expires_in,
        token_type: exchanged.token_type,
        orcid: exchanged.orcid,
        name: exchanged.name,
        id: profile.id,
    }))
}

/// Find or create the profile for a freshly issued token, keep the token,
/// and refresh the profile from the ORCID record.
async fn link_profile(state: &AppState, exchanged: &ExchangedToken) -> Result<Profile, ServiceError> {
    let name = exchanged.name.as_deref().map(Name::new);

    let mut profile = state
        .profiles
        .find_or_create(
            Some(&exchanged.orcid),
            &[],
            name.clone().unwrap_or_else(|| Name::new(exchanged.orcid.as_str())),
        )
        .await?;

    if let Some(name) = name {
        if profile.name != name {
            profile.name = name;
            state.profiles.save(&profile).await?;
        }
    }

    state
        .orcid_tokens
        .add(OrcidToken::new(
            exchanged.orcid.as_str(),
            exchanged.access_token.as_str(),
            exchanged.expires_in,
        ))
        .await?;

    let record = match state
        .orcid_client
        .get_record(&exchanged.orcid, &exchanged.access_token)
        .await
    {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(
                profile_id = %profile.id,
                orcid = %exchanged.orcid,
                error = %err,
                "Unable to refresh profile from ORCID record"
            );
            return Ok(profile);
        }
    };

    let before = profile.clone();
    state.reconciler.reconcile(&mut profile, &record).await;
    if profile != before {
        if let Err(err) = state.profiles.save(&profile).await {
            tracing::warn!(
                profile_id = %profile.id,
                orcid = %exchanged.orcid,
                error = %err,
                "Unable to store profile refreshed from ORCID record"
            );
            return Ok(before);
        }
    }

    Ok(profile)
}

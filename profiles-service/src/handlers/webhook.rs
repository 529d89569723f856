use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::services::ServiceError;
use crate::AppState;

/// ORCID notification that a record changed.
///
/// POST /orcid-webhook/{payload}
///
/// Answers with a bare status: 204 once merged, 404 for unknown or
/// tampered payloads, 503 when the cached token was revoked, 500 otherwise.
#[tracing::instrument(skip_all)]
pub async fn update(State(state): State<AppState>, Path(payload): Path<String>) -> StatusCode {
    let Some(orcid) = state.uri_signer.verify(&payload) else {
        tracing::info!("Rejected ORCID webhook with an invalid signature");
        return StatusCode::NOT_FOUND;
    };

    match refresh(&state, &orcid).await {
        Ok(status) => status,
        Err(err) => {
            tracing::error!(orcid = %orcid, error = %err, "Failed to update profile from ORCID webhook");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn refresh(state: &AppState, orcid: &str) -> Result<StatusCode, ServiceError> {
    let mut profile = match state.profiles.get_by_orcid(orcid).await {
        Ok(profile) => profile,
        Err(ServiceError::ProfileNotFound(_)) => {
            tracing::info!(orcid = %orcid, "ORCID webhook for an unknown profile");
            return Ok(StatusCode::NOT_FOUND);
        }
        Err(err) => return Err(err),
    };

    let cached = match state.orcid_tokens.get(orcid).await {
        Ok(token) => Some(token.access_token),
        Err(ServiceError::OrcidTokenNotFound(_)) => None,
        Err(err) => return Err(err),
    };

    let access_token = match cached.as_deref() {
        Some(token) => token,
        None => state
            .config
            .orcid
            .read_public_access_token
            .as_deref()
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!("No ORCID read-public access token"))
            })?,
    };

    let record = match state.orcid_client.get_record(orcid, access_token).await {
        Ok(record) => record,
        Err(err) if cached.is_some() && err.status() == Some(StatusCode::FORBIDDEN) => {
            tracing::warn!(orcid = %orcid, "ORCID access token no longer valid, discarding it");
            match state.orcid_tokens.remove(orcid).await {
                Ok(()) | Err(ServiceError::OrcidTokenNotFound(_)) => {}
                Err(err) => return Err(err),
            }
            return Ok(StatusCode::SERVICE_UNAVAILABLE);
        }
        Err(err) => return Err(err.into()),
    };

    let before = profile.clone();
    state.reconciler.reconcile(&mut profile, &record).await;
    if profile == before {
        tracing::debug!(profile_id = %profile.id, orcid = %orcid, "ORCID record brought no changes");
        return Ok(StatusCode::NO_CONTENT);
    }

    state.profiles.save(&profile).await?;

    tracing::info!(profile_id = %profile.id, orcid = %orcid, "Profile updated from ORCID webhook");
    Ok(StatusCode::NO_CONTENT)
}

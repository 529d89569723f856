//! Administrative commands run from the command line.

use crate::models::Name;
use crate::models::Profile;
use crate::repositories::{ProfileRepository, SortOrder, TokenRepository};
use crate::services::{ServiceError, WebhookMaintainer};

const BATCH_SIZE: i64 = 100;

/// Delete every token and profile.
pub async fn clear(
    profiles: &dyn ProfileRepository,
    orcid_tokens: &dyn TokenRepository,
) -> Result<(), ServiceError> {
    orcid_tokens.clear().await?;
    profiles.clear().await?;

    tracing::info!("All profiles and ORCID tokens removed");
    Ok(())
}

/// Create a profile without an ORCID iD, or return the one already holding
/// `email`.
pub async fn create_profile(
    profiles: &dyn ProfileRepository,
    name: &str,
    email: &str,
) -> Result<Profile, ServiceError> {
    let profile = profiles
        .find_or_create(None, &[email.to_string()], Name::new(name))
        .await?;

    tracing::info!(profile_id = %profile.id, "Profile ready");
    Ok(profile)
}

/// Register a webhook for every profile with an ORCID iD. Returns how many
/// registrations succeeded.
pub async fn set_orcid_webhooks(
    profiles: &dyn ProfileRepository,
    maintainer: &WebhookMaintainer,
) -> Result<usize, ServiceError> {
    let mut registered = 0;
    let mut offset = 0;

    loop {
        let batch = profiles
            .list(Some(BATCH_SIZE), Some(offset), SortOrder::Asc)
            .await?;
        if batch.is_empty() {
            break;
        }
        offset += batch.len() as i64;

        for orcid in batch.iter().filter_map(|profile| profile.orcid.as_deref()) {
            match maintainer.register(orcid).await {
                Ok(()) => registered += 1,
                Err(err) => {
                    tracing::error!(orcid = %orcid, error = %err, "Failed to register ORCID webhook")
                }
            }
        }
    }

    tracing::info!(registered = registered, "ORCID webhooks registered");
    Ok(registered)
}

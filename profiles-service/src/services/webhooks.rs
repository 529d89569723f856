use async_trait::async_trait;
use std::sync::Arc;

use super::error::ServiceError;
use super::events::{CommitHook, ProfileChange};
use super::orcid::OrcidApi;
use super::signer::UriSigner;

/// Keeps ORCID webhooks in step with the profiles that carry an ORCID iD.
pub struct WebhookMaintainer {
    orcid: Arc<dyn OrcidApi>,
    signer: UriSigner,
    public_url: String,
    access_token: Option<String>,
}

impl WebhookMaintainer {
    pub fn new(
        orcid: Arc<dyn OrcidApi>,
        signer: UriSigner,
        public_url: &str,
        access_token: Option<String>,
    ) -> Self {
        Self {
            orcid,
            signer,
            public_url: public_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn webhook_uri(&self, orcid: &str) -> Result<String, ServiceError> {
        Ok(format!(
            "{}/orcid-webhook/{}",
            self.public_url,
            self.signer.sign(orcid)?
        ))
    }

    fn access_token(&self) -> Result<&str, ServiceError> {
        self.access_token.as_deref().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("No ORCID webhook access token configured"))
        })
    }

    pub async fn register(&self, orcid: &str) -> Result<(), ServiceError> {
        let uri = self.webhook_uri(orcid)?;
        self.orcid
            .set_webhook(orcid, &uri, self.access_token()?)
            .await?;
        Ok(())
    }

    pub async fn deregister(&self, orcid: &str) -> Result<(), ServiceError> {
        let uri = self.webhook_uri(orcid)?;
        self.orcid
            .remove_webhook(orcid, &uri, self.access_token()?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommitHook for WebhookMaintainer {
    fn name(&self) -> &'static str {
        "webhook_maintainer"
    }

    async fn after_commit(&self, change: &ProfileChange) -> Result<(), anyhow::Error> {
        let Some(orcid) = change.profile().orcid.as_deref() else {
            return Ok(());
        };

        let result = match change {
            ProfileChange::Inserted(_) => self.register(orcid).await,
            ProfileChange::Deleted(_) => self.deregister(orcid).await,
            ProfileChange::Updated(_) => return Ok(()),
        };

        if let Err(err) = result {
            tracing::error!(
                orcid = %orcid,
                change = change.kind(),
                error = %err,
                "Failed to update ORCID webhook"
            );
        }

        Ok(())
    }
}

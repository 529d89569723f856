use super::orcid::OrcidApiError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ORCID API error: {0}")]
    Orcid(#[from] OrcidApiError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("ORCID token not found for {0}")]
    OrcidTokenNotFound(String),

    #[error("Affiliation not found: {0}")]
    AffiliationNotFound(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Unable to generate a unique profile ID after {0} attempts")]
    IdGenerationExhausted(u32),

    #[error("Unexpected response from ORCID: {0}")]
    UpstreamContract(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Orcid(e) => AppError::InternalError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::ProfileNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Profile {} not found", id))
            }
            ServiceError::OrcidTokenNotFound(orcid) => {
                AppError::NotFound(anyhow::anyhow!("ORCID token for {} not found", orcid))
            }
            ServiceError::AffiliationNotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Affiliation {} not found", id))
            }
            ServiceError::Integrity(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::IdGenerationExhausted(attempts) => AppError::InternalError(
                anyhow::anyhow!("No unused profile ID after {} attempts", attempts),
            ),
            ServiceError::UpstreamContract(e) => AppError::InternalError(anyhow::anyhow!(e)),
        }
    }
}

use async_trait::async_trait;
use sqlx::PgPool;

use super::is_unique_violation;
use crate::models::OrcidToken;
use crate::services::ServiceError;

/// Provider tokens, one per ORCID iD.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get(&self, orcid: &str) -> Result<OrcidToken, ServiceError>;

    /// Store `token`, replacing any token already held for its ORCID iD.
    async fn add(&self, token: OrcidToken) -> Result<(), ServiceError>;

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError>;

    async fn clear(&self) -> Result<(), ServiceError>;
}

pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn get(&self, orcid: &str) -> Result<OrcidToken, ServiceError> {
        sqlx::query_as::<_, OrcidToken>(
            "SELECT orcid, access_token, expires_at FROM orcid_tokens WHERE orcid = $1",
        )
        .bind(orcid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::OrcidTokenNotFound(orcid.to_string()))
    }

    async fn add(&self, token: OrcidToken) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO orcid_tokens (orcid, access_token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (orcid) DO UPDATE
            SET access_token = EXCLUDED.access_token, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&token.orcid)
        .bind(&token.access_token)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(orcid = %token.orcid, "Access token already held by another ORCID iD");
                Err(ServiceError::Integrity(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError> {
        let deleted = sqlx::query("DELETE FROM orcid_tokens WHERE orcid = $1")
            .bind(orcid)
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(ServiceError::OrcidTokenNotFound(orcid.to_string()));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM orcid_tokens")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

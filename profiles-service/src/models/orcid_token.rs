use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A provider access token issued for one ORCID iD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrcidToken {
    pub orcid: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OrcidToken {
    pub fn new(orcid: impl Into<String>, access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            orcid: orcid.into(),
            access_token: access_token.into(),
            expires_at: expires_at(Utc::now(), expires_in),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub fn expires_at(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

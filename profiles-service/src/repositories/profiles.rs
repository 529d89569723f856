use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::is_unique_violation;
use crate::models::{Address, Affiliation, EmailAddress, Name, PartialDate, Profile};
use crate::services::events::{CommitHooks, ProfileChange};
use crate::services::ids::{next_unused_id, IdGenerator};
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("Invalid order {}", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Storage for profile aggregates. Implementations run their commit hooks
/// after every committed `add`, `save` and `remove`.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a new profile. Losing a race on the ORCID iD or an email
    /// address returns the profile that won instead.
    async fn add(&self, profile: Profile) -> Result<Profile, ServiceError>;

    /// Persist every part of an existing profile in one transaction.
    async fn save(&self, profile: &Profile) -> Result<(), ServiceError>;

    async fn get(&self, id: &str) -> Result<Profile, ServiceError>;

    async fn get_by_orcid(&self, orcid: &str) -> Result<Profile, ServiceError>;

    /// The profile holding any of `emails`.
    async fn get_by_email_address(&self, emails: &[String]) -> Result<Profile, ServiceError>;

    async fn next_id(&self) -> Result<String, ServiceError>;

    async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Profile>, ServiceError>;

    async fn count(&self) -> Result<i64, ServiceError>;

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError>;

    /// Delete everything. Commit hooks are not run.
    async fn clear(&self) -> Result<(), ServiceError>;

    async fn find_or_create(
        &self,
        orcid: Option<&str>,
        emails: &[String],
        name: Name,
    ) -> Result<Profile, ServiceError> {
        if let Some(orcid) = orcid {
            match self.get_by_orcid(orcid).await {
                Ok(profile) => return Ok(profile),
                Err(ServiceError::ProfileNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        match self.get_by_email_address(emails).await {
            Ok(profile) => return Ok(profile),
            Err(ServiceError::ProfileNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let mut profile = Profile::new(self.next_id().await?, name, orcid.map(str::to_string));
        for email in emails {
            profile.add_email_address(email, false, false);
        }

        self.add(profile).await
    }
}

/// After losing an insert race, the profile that holds the same ORCID iD or
/// one of the same email addresses.
pub(crate) async fn find_conflicting<R>(repo: &R, profile: &Profile) -> Result<Profile, ServiceError>
where
    R: ProfileRepository + ?Sized,
{
    if let Some(orcid) = profile.orcid.as_deref() {
        match repo.get_by_orcid(orcid).await {
            Err(ServiceError::ProfileNotFound(_)) => {}
            found => return found,
        }
    }

    let emails: Vec<String> = profile
        .email_addresses
        .iter()
        .map(|address| address.email.clone())
        .collect();

    match repo.get_by_email_address(&emails).await {
        Err(ServiceError::ProfileNotFound(_)) => Err(ServiceError::Integrity(format!(
            "Profile {} conflicts with an existing profile",
            profile.id
        ))),
        found => found,
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: String,
    preferred_name: String,
    index_name: String,
    orcid: Option<String>,
}

#[derive(FromRow)]
struct AffiliationRow {
    id: String,
    profile_id: String,
    department: Option<String>,
    organisation: String,
    city: String,
    region: Option<String>,
    country: String,
    starts_year: Option<i32>,
    starts_month: Option<i32>,
    starts_day: Option<i32>,
    ends_year: Option<i32>,
    ends_month: Option<i32>,
    ends_day: Option<i32>,
    restricted: bool,
    position: i32,
}

#[derive(FromRow)]
struct EmailAddressRow {
    email: String,
    profile_id: String,
    restricted: bool,
    position: i32,
}

fn date_from_columns(
    year: Option<i32>,
    month: Option<i32>,
    day: Option<i32>,
) -> Option<PartialDate> {
    let month = month.and_then(|month| u32::try_from(month).ok());
    let day = day.and_then(|day| u32::try_from(day).ok());
    PartialDate::new(year?, month, day).ok()
}

fn date_to_columns(date: Option<PartialDate>) -> (Option<i32>, Option<i32>, Option<i32>) {
    match date {
        Some(date) => (
            Some(date.year()),
            date.month().map(|month| month as i32),
            date.day().map(|day| day as i32),
        ),
        None => (None, None, None),
    }
}

impl From<AffiliationRow> for Affiliation {
    fn from(row: AffiliationRow) -> Self {
        Affiliation {
            id: row.id,
            department: row.department,
            organisation: row.organisation,
            address: Address::new(row.city, row.region, &row.country),
            starts: date_from_columns(row.starts_year, row.starts_month, row.starts_day),
            ends: date_from_columns(row.ends_year, row.ends_month, row.ends_day),
            restricted: row.restricted,
            position: row.position.max(0) as usize,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, preferred_name, index_name, orcid";

/// PostgreSQL-backed profile storage.
pub struct PgProfileRepository {
    pool: PgPool,
    hooks: CommitHooks,
    id_generator: IdGenerator,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool, hooks: CommitHooks, id_generator: IdGenerator) -> Self {
        Self {
            pool,
            hooks,
            id_generator,
        }
    }

    async fn hydrate(&self, rows: Vec<ProfileRow>) -> Result<Vec<Profile>, ServiceError> {
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();

        let affiliations: Vec<AffiliationRow> = sqlx::query_as(
            "SELECT * FROM affiliations WHERE profile_id = ANY($1) ORDER BY profile_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let emails: Vec<EmailAddressRow> = sqlx::query_as(
            "SELECT * FROM email_addresses WHERE profile_id = ANY($1) ORDER BY profile_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut profiles: Vec<Profile> = rows
            .into_iter()
            .map(|row| {
                Profile::new(
                    row.id,
                    Name::with_index(row.preferred_name, row.index_name),
                    row.orcid,
                )
            })
            .collect();
        let index: HashMap<String, usize> = profiles
            .iter()
            .enumerate()
            .map(|(i, profile)| (profile.id.clone(), i))
            .collect();

        for row in affiliations {
            if let Some(&i) = index.get(&row.profile_id) {
                profiles[i].affiliations.push(row.into());
            }
        }
        for row in emails {
            if let Some(&i) = index.get(&row.profile_id) {
                profiles[i].email_addresses.push(EmailAddress {
                    email: row.email,
                    restricted: row.restricted,
                    position: row.position.max(0) as usize,
                });
            }
        }

        Ok(profiles)
    }

    async fn fetch_one(&self, row: Option<ProfileRow>, missing: &str) -> Result<Profile, ServiceError> {
        let row = row.ok_or_else(|| ServiceError::ProfileNotFound(missing.to_string()))?;
        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::ProfileNotFound(missing.to_string()))
    }

    async fn write_children(
        tx: &mut Transaction<'_, Postgres>,
        profile: &Profile,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM affiliations WHERE profile_id = $1")
            .bind(&profile.id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM email_addresses WHERE profile_id = $1")
            .bind(&profile.id)
            .execute(&mut **tx)
            .await?;

        for (position, affiliation) in profile.affiliations.iter().enumerate() {
            let (starts_year, starts_month, starts_day) = date_to_columns(affiliation.starts);
            let (ends_year, ends_month, ends_day) = date_to_columns(affiliation.ends);

            sqlx::query(
                r#"
                INSERT INTO affiliations (
                    id, profile_id, department, organisation, city, region, country,
                    starts_year, starts_month, starts_day, ends_year, ends_month, ends_day,
                    restricted, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(&affiliation.id)
            .bind(&profile.id)
            .bind(&affiliation.department)
            .bind(&affiliation.organisation)
            .bind(&affiliation.address.city)
            .bind(&affiliation.address.region)
            .bind(&affiliation.address.country)
            .bind(starts_year)
            .bind(starts_month)
            .bind(starts_day)
            .bind(ends_year)
            .bind(ends_month)
            .bind(ends_day)
            .bind(affiliation.restricted)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }

        for (position, address) in profile.email_addresses.iter().enumerate() {
            sqlx::query(
                "INSERT INTO email_addresses (email, profile_id, restricted, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(&address.email)
            .bind(&profile.id)
            .bind(address.restricted)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn insert(&self, profile: &Profile) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO profiles (id, preferred_name, index_name, orcid) VALUES ($1, $2, $3, $4)",
        )
        .bind(&profile.id)
        .bind(&profile.name.preferred)
        .bind(&profile.name.index)
        .bind(&profile.orcid)
        .execute(&mut *tx)
        .await?;

        Self::write_children(&mut tx, profile).await?;

        tx.commit().await
    }

    /// Returns whether the profile row existed.
    async fn update(&self, profile: &Profile) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE profiles SET preferred_name = $2, index_name = $3, orcid = $4 WHERE id = $1",
        )
        .bind(&profile.id)
        .bind(&profile.name.preferred)
        .bind(&profile.name.index)
        .bind(&profile.orcid)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::write_children(&mut tx, profile).await?;
        tx.commit().await?;

        Ok(true)
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn add(&self, profile: Profile) -> Result<Profile, ServiceError> {
        match self.insert(&profile).await {
            Ok(()) => {
                tracing::info!(profile_id = %profile.id, orcid = ?profile.orcid, "Profile created");
                self.hooks
                    .dispatch(ProfileChange::Inserted(profile.clone()))
                    .await;
                Ok(profile)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::info!(
                    profile_id = %profile.id,
                    orcid = ?profile.orcid,
                    "Profile created concurrently, using the existing one"
                );
                find_conflicting(self, &profile).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, profile: &Profile) -> Result<(), ServiceError> {
        match self.update(profile).await {
            Ok(true) => {
                self.hooks
                    .dispatch(ProfileChange::Updated(profile.clone()))
                    .await;
                Ok(())
            }
            Ok(false) => Err(ServiceError::ProfileNotFound(profile.id.clone())),
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(profile_id = %profile.id, error = %err, "Profile update rolled back");
                Err(ServiceError::Integrity(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Profile, ServiceError> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        self.fetch_one(row, id).await
    }

    async fn get_by_orcid(&self, orcid: &str) -> Result<Profile, ServiceError> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profiles WHERE orcid = $1",
            PROFILE_COLUMNS
        ))
        .bind(orcid)
        .fetch_optional(&self.pool)
        .await?;

        self.fetch_one(row, orcid).await
    }

    async fn get_by_email_address(&self, emails: &[String]) -> Result<Profile, ServiceError> {
        if emails.is_empty() {
            return Err(ServiceError::ProfileNotFound("no email addresses".to_string()));
        }

        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.preferred_name, p.index_name, p.orcid
            FROM profiles p
            JOIN email_addresses e ON e.profile_id = p.id
            WHERE e.email = ANY($1)
            LIMIT 1
            "#,
        )
        .bind(emails)
        .fetch_optional(&self.pool)
        .await?;

        self.fetch_one(row, &emails.join(", ")).await
    }

    async fn next_id(&self) -> Result<String, ServiceError> {
        next_unused_id(&self.id_generator, |candidate| async move {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)")
                    .bind(candidate)
                    .fetch_one(&self.pool)
                    .await?;
            Ok::<_, ServiceError>(exists)
        })
        .await
    }

    async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Profile>, ServiceError> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profiles ORDER BY index_name {}, id {} LIMIT $1 OFFSET $2",
            PROFILE_COLUMNS,
            order.as_sql(),
            order.as_sql()
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError> {
        let profile = self.get_by_orcid(orcid).await?;

        let deleted = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(&profile.id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ServiceError::ProfileNotFound(orcid.to_string()));
        }

        tracing::info!(profile_id = %profile.id, orcid = %orcid, "Profile removed");
        self.hooks.dispatch(ProfileChange::Deleted(profile)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        sqlx::query("TRUNCATE profiles, affiliations, email_addresses")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//! In-process repositories with the same uniqueness rules as PostgreSQL.
//! Used by tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::orcid_tokens::TokenRepository;
use super::profiles::{find_conflicting, ProfileRepository, SortOrder};
use crate::models::{OrcidToken, Profile};
use crate::services::events::{CommitHooks, ProfileChange};
use crate::services::ids::{next_unused_id, random_id_generator, IdGenerator};
use crate::services::ServiceError;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ServiceError> {
    mutex
        .lock()
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Repository mutex poisoned: {}", e)))
}

pub struct InMemoryProfileRepository {
    profiles: Mutex<BTreeMap<String, Profile>>,
    hooks: CommitHooks,
    id_generator: IdGenerator,
}

impl Default for InMemoryProfileRepository {
    fn default() -> Self {
        Self::new(CommitHooks::default(), random_id_generator())
    }
}

impl InMemoryProfileRepository {
    pub fn new(hooks: CommitHooks, id_generator: IdGenerator) -> Self {
        Self {
            profiles: Mutex::new(BTreeMap::new()),
            hooks,
            id_generator,
        }
    }

    /// Some other profile already holds the ORCID iD or an email address.
    fn conflict(stored: &BTreeMap<String, Profile>, profile: &Profile) -> Option<String> {
        stored
            .values()
            .filter(|other| other.id != profile.id)
            .find_map(|other| {
                if profile.orcid.is_some() && other.orcid == profile.orcid {
                    return Some(format!("ORCID iD already used by profile {}", other.id));
                }
                profile
                    .email_addresses
                    .iter()
                    .find(|address| {
                        other
                            .email_addresses
                            .iter()
                            .any(|held| held.email == address.email)
                    })
                    .map(|address| {
                        format!("{} already used by profile {}", address.email, other.id)
                    })
            })
    }

    fn find(&self, predicate: impl Fn(&Profile) -> bool) -> Result<Option<Profile>, ServiceError> {
        Ok(lock(&self.profiles)?
            .values()
            .find(|profile| predicate(profile))
            .cloned())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn add(&self, profile: Profile) -> Result<Profile, ServiceError> {
        let inserted = {
            let mut stored = lock(&self.profiles)?;
            if stored.contains_key(&profile.id) || Self::conflict(&stored, &profile).is_some() {
                false
            } else {
                stored.insert(profile.id.clone(), profile.clone());
                true
            }
        };

        if !inserted {
            tracing::info!(profile_id = %profile.id, "Profile created concurrently, using the existing one");
            return find_conflicting(self, &profile).await;
        }

        self.hooks
            .dispatch(ProfileChange::Inserted(profile.clone()))
            .await;
        Ok(profile)
    }

    async fn save(&self, profile: &Profile) -> Result<(), ServiceError> {
        {
            let mut stored = lock(&self.profiles)?;
            if !stored.contains_key(&profile.id) {
                return Err(ServiceError::ProfileNotFound(profile.id.clone()));
            }
            if let Some(conflict) = Self::conflict(&stored, profile) {
                return Err(ServiceError::Integrity(conflict));
            }
            stored.insert(profile.id.clone(), profile.clone());
        }

        self.hooks
            .dispatch(ProfileChange::Updated(profile.clone()))
            .await;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Profile, ServiceError> {
        lock(&self.profiles)?
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::ProfileNotFound(id.to_string()))
    }

    async fn get_by_orcid(&self, orcid: &str) -> Result<Profile, ServiceError> {
        self.find(|profile| profile.orcid.as_deref() == Some(orcid))?
            .ok_or_else(|| ServiceError::ProfileNotFound(orcid.to_string()))
    }

    async fn get_by_email_address(&self, emails: &[String]) -> Result<Profile, ServiceError> {
        self.find(|profile| {
            profile
                .email_addresses
                .iter()
                .any(|address| emails.contains(&address.email))
        })?
        .ok_or_else(|| ServiceError::ProfileNotFound(emails.join(", ")))
    }

    async fn next_id(&self) -> Result<String, ServiceError> {
        next_unused_id(&self.id_generator, |candidate| async move {
            Ok::<_, ServiceError>(lock(&self.profiles)?.contains_key(&candidate))
        })
        .await
    }

    async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        order: SortOrder,
    ) -> Result<Vec<Profile>, ServiceError> {
        let mut profiles: Vec<Profile> = lock(&self.profiles)?.values().cloned().collect();
        profiles.sort_by(|a, b| (&a.name.index, &a.id).cmp(&(&b.name.index, &b.id)));
        if order == SortOrder::Desc {
            profiles.reverse();
        }

        let offset = offset.unwrap_or(0).max(0) as usize;
        let limit = limit.map_or(usize::MAX, |limit| limit.max(0) as usize);

        Ok(profiles.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<i64, ServiceError> {
        Ok(lock(&self.profiles)?.len() as i64)
    }

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError> {
        let removed = {
            let mut stored = lock(&self.profiles)?;
            let id = stored
                .values()
                .find(|profile| profile.orcid.as_deref() == Some(orcid))
                .map(|profile| profile.id.clone())
                .ok_or_else(|| ServiceError::ProfileNotFound(orcid.to_string()))?;
            stored
                .remove(&id)
                .ok_or_else(|| ServiceError::ProfileNotFound(orcid.to_string()))?
        };

        self.hooks.dispatch(ProfileChange::Deleted(removed)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        lock(&self.profiles)?.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: Mutex<BTreeMap<String, OrcidToken>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn get(&self, orcid: &str) -> Result<OrcidToken, ServiceError> {
        lock(&self.tokens)?
            .get(orcid)
            .cloned()
            .ok_or_else(|| ServiceError::OrcidTokenNotFound(orcid.to_string()))
    }

    async fn add(&self, token: OrcidToken) -> Result<(), ServiceError> {
        let mut tokens = lock(&self.tokens)?;
        if tokens
            .values()
            .any(|held| held.orcid != token.orcid && held.access_token == token.access_token)
        {
            return Err(ServiceError::Integrity(format!(
                "Access token already held by another ORCID iD than {}",
                token.orcid
            )));
        }

        tokens.insert(token.orcid.clone(), token);
        Ok(())
    }

    async fn remove(&self, orcid: &str) -> Result<(), ServiceError> {
        lock(&self.tokens)?
            .remove(orcid)
            .map(|_| ())
            .ok_or_else(|| ServiceError::OrcidTokenNotFound(orcid.to_string()))
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        lock(&self.tokens)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Name;
    use crate::services::events::{MockEventPublisher, SendUpdateEvents};
    use crate::services::ids::{sequence_generator, MAX_ID_ATTEMPTS};
    use std::sync::Arc;

    fn repository(ids: Vec<&str>) -> InMemoryProfileRepository {
        InMemoryProfileRepository::new(CommitHooks::default(), sequence_generator(ids))
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let profiles = repository(vec!["aaaaaaaa", "bbbbbbbb"]);

        let first = profiles
            .find_or_create(Some("0000-0002-1825-0097"), &[], Name::new("Josiah Carberry"))
            .await
            .unwrap();
        let second = profiles
            .find_or_create(Some("0000-0002-1825-0097"), &[], Name::new("Someone Else"))
            .await
            .unwrap();

        assert_eq!(first.id, "aaaaaaaa");
        assert_eq!(second.id, "aaaaaaaa");
        assert_eq!(profiles.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_or_create_by_email() {
        let profiles = repository(vec!["aaaaaaaa", "bbbbbbbb"]);
        let emails = vec!["foo@example.com".to_string()];

        let created = profiles
            .find_or_create(None, &emails, Name::new("Foo Bar"))
            .await
            .unwrap();
        assert_eq!(created.primary_email_address().unwrap().email, "foo@example.com");

        let found = profiles
            .find_or_create(
                None,
                &["other@example.com".to_string(), "foo@example.com".to_string()],
                Name::new("Foo Bar"),
            )
            .await
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_add_returns_winner_of_orcid_race() {
        let profiles = repository(vec!["aaaaaaaa"]);
        let winner = Profile::new("aaaaaaaa", Name::new("Foo Bar"), Some("0000-0002-1825-0097".to_string()));
        let loser = Profile::new("bbbbbbbb", Name::new("Foo Bar"), Some("0000-0002-1825-0097".to_string()));

        profiles.add(winner).await.unwrap();
        let result = profiles.add(loser).await.unwrap();

        assert_eq!(result.id, "aaaaaaaa");
        assert_eq!(profiles.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_email_held_elsewhere() {
        let profiles = repository(vec![]);
        let mut first = Profile::new("aaaaaaaa", Name::new("Foo Bar"), None);
        first.add_email_address("foo@example.com", true, false);
        profiles.add(first).await.unwrap();

        let mut second = profiles
            .add(Profile::new("bbbbbbbb", Name::new("Baz Qux"), None))
            .await
            .unwrap();
        second.add_email_address("foo@example.com", true, false);

        assert!(matches!(
            profiles.save(&second).await,
            Err(ServiceError::Integrity(_))
        ));
        assert!(profiles.get("bbbbbbbb").await.unwrap().email_addresses.is_empty());
    }

    #[tokio::test]
    async fn test_next_id_skips_used_ids() {
        let profiles = repository(vec!["aaaaaaaa", "aaaaaaaa", "cccccccc"]);
        profiles
            .add(Profile::new("aaaaaaaa", Name::new("Foo Bar"), None))
            .await
            .unwrap();

        assert_eq!(profiles.next_id().await.unwrap(), "cccccccc");
    }

    #[tokio::test]
    async fn test_next_id_gives_up() {
        let profiles = repository(vec!["aaaaaaaa"]);
        profiles
            .add(Profile::new("aaaaaaaa", Name::new("Foo Bar"), None))
            .await
            .unwrap();

        assert!(matches!(
            profiles.next_id().await,
            Err(ServiceError::IdGenerationExhausted(MAX_ID_ATTEMPTS))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_by_index_name() {
        let profiles = repository(vec![]);
        for (id, name) in [("aaaaaaaa", "Profile 2"), ("bbbbbbbb", "Profile 1"), ("cccccccc", "Profile 3")] {
            profiles
                .add(Profile::new(id, Name::with_index(name, name), None))
                .await
                .unwrap();
        }

        let asc: Vec<String> = profiles
            .list(Some(2), Some(0), SortOrder::Asc)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name.index)
            .collect();
        assert_eq!(asc, vec!["Profile 1", "Profile 2"]);

        let desc = profiles.list(None, Some(1), SortOrder::Desc).await.unwrap();
        assert_eq!(desc[0].name.index, "Profile 2");
        assert_eq!(desc.len(), 2);
    }

    #[tokio::test]
    async fn test_hooks_run_after_writes_but_not_clear() {
        let publisher = Arc::new(MockEventPublisher::default());
        let hooks = CommitHooks::new(vec![Arc::new(SendUpdateEvents::new(publisher.clone()))]);
        let profiles = InMemoryProfileRepository::new(hooks, sequence_generator(vec![]));

        let profile = profiles
            .add(Profile::new("aaaaaaaa", Name::new("Foo Bar"), Some("0000-0002-1825-0097".to_string())))
            .await
            .unwrap();
        profiles.save(&profile).await.unwrap();
        profiles.remove("0000-0002-1825-0097").await.unwrap();
        profiles.clear().await.unwrap();

        assert_eq!(publisher.published(), vec!["aaaaaaaa"; 3]);
    }

    #[tokio::test]
    async fn test_tokens_are_replaced_wholesale() {
        let tokens = InMemoryTokenRepository::new();
        tokens
            .add(OrcidToken::new("0000-0002-1825-0097", "first", 3600))
            .await
            .unwrap();
        tokens
            .add(OrcidToken::new("0000-0002-1825-0097", "second", 3600))
            .await
            .unwrap();

        assert_eq!(tokens.get("0000-0002-1825-0097").await.unwrap().access_token, "second");
        assert!(matches!(
            tokens.add(OrcidToken::new("0000-0001-0000-0000", "second", 3600)).await,
            Err(ServiceError::Integrity(_))
        ));

        tokens.remove("0000-0002-1825-0097").await.unwrap();
        assert!(matches!(
            tokens.get("0000-0002-1825-0097").await,
            Err(ServiceError::OrcidTokenNotFound(_))
        ));
    }
}

//! Post-commit fan-out for profile changes.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::Profile;

/// A profile change that has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileChange {
    Inserted(Profile),
    Updated(Profile),
    Deleted(Profile),
}

impl ProfileChange {
    pub fn profile(&self) -> &Profile {
        match self {
            ProfileChange::Inserted(profile)
            | ProfileChange::Updated(profile)
            | ProfileChange::Deleted(profile) => profile,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProfileChange::Inserted(_) => "inserted",
            ProfileChange::Updated(_) => "updated",
            ProfileChange::Deleted(_) => "deleted",
        }
    }
}

#[async_trait]
pub trait CommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_commit(&self, change: &ProfileChange) -> Result<(), anyhow::Error>;
}

/// Hooks run in registration order once a write has committed. A failing
/// hook is logged and never affects the write or later hooks.
#[derive(Clone, Default)]
pub struct CommitHooks {
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl CommitHooks {
    pub fn new(hooks: Vec<Arc<dyn CommitHook>>) -> Self {
        Self { hooks }
    }

    pub async fn dispatch(&self, change: ProfileChange) {
        for hook in &self.hooks {
            if let Err(err) = hook.after_commit(&change).await {
                tracing::error!(
                    hook = hook.name(),
                    profile_id = %change.profile().id,
                    change = change.kind(),
                    error = %err,
                    "Post-commit hook failed"
                );
            }
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, profile_id: &str) -> Result<(), anyhow::Error>;
}

/// Emits profile changes to the log stream.
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, profile_id: &str) -> Result<(), anyhow::Error> {
        tracing::info!(event_type = "profile", profile_id = %profile_id, "Profile changed");
        Ok(())
    }
}

/// Records published profile IDs.
#[derive(Default)]
pub struct MockEventPublisher {
    pub published: Mutex<Vec<String>>,
}

impl MockEventPublisher {
    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, profile_id: &str) -> Result<(), anyhow::Error> {
        self.published
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock publisher mutex poisoned: {}", e))?
            .push(profile_id.to_string());
        Ok(())
    }
}

/// Publishes the ID of every changed profile.
pub struct SendUpdateEvents {
    publisher: Arc<dyn EventPublisher>,
}

impl SendUpdateEvents {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl CommitHook for SendUpdateEvents {
    fn name(&self) -> &'static str {
        "send_update_events"
    }

    async fn after_commit(&self, change: &ProfileChange) -> Result<(), anyhow::Error> {
        self.publisher.publish(&change.profile().id).await
    }
}

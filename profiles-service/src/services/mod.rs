pub mod error;
pub mod events;
pub mod ids;
pub mod orcid;
pub mod reconciler;
pub mod record;
pub mod signer;
pub mod token_exchange;
pub mod webhooks;

pub use error::ServiceError;
pub use events::{
    CommitHook, CommitHooks, EventPublisher, LoggingEventPublisher, MockEventPublisher,
    ProfileChange, SendUpdateEvents,
};
pub use orcid::{MockOrcidApi, OrcidApi, OrcidApiClient, OrcidApiError, OrcidCall};
pub use reconciler::ProfileReconciler;
pub use signer::UriSigner;
pub use token_exchange::{ExchangedToken, TokenExchanger};
pub use webhooks::WebhookMaintainer;

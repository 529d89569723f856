use super::error::ServiceError;
use rand::{distributions::Uniform, Rng};
use std::future::Future;
use std::sync::Arc;

pub const ID_LENGTH: usize = 8;
pub const MAX_ID_ATTEMPTS: u32 = 10;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Source of candidate profile IDs.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub fn random_id() -> String {
    let mut rng = rand::thread_rng();
    let range = Uniform::from(0..ID_ALPHABET.len());

    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.sample(range)] as char)
        .collect()
}

pub fn random_id_generator() -> IdGenerator {
    Arc::new(random_id)
}

/// Draw candidates until `in_use` reports one as free, giving up after
/// [`MAX_ID_ATTEMPTS`].
pub async fn next_unused_id<F, Fut>(generator: &IdGenerator, in_use: F) -> Result<String, ServiceError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool, ServiceError>>,
{
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let candidate = generator();
        if !in_use(candidate.clone()).await? {
            return Ok(candidate);
        }
        tracing::debug!(attempt = attempt, id = %candidate, "Profile ID already in use");
    }

    tracing::error!(attempts = MAX_ID_ATTEMPTS, "Unable to generate an unused profile ID");
    Err(ServiceError::IdGenerationExhausted(MAX_ID_ATTEMPTS))
}

/// Yields the given IDs in order, then repeats the last one.
#[cfg(test)]
pub(crate) fn sequence_generator(ids: Vec<&str>) -> IdGenerator {
    let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
    let next = std::sync::atomic::AtomicUsize::new(0);

    Arc::new(move || {
        let index = next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        ids.get(index)
            .or_else(|| ids.last())
            .cloned()
            .unwrap_or_default()
    })
}

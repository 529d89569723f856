use service_core::utils::signature::{sign_token, verify_token};
use std::sync::Arc;

use super::error::ServiceError;

/// Signs ORCID iDs into opaque, URL-safe path segments for webhook URIs.
#[derive(Clone)]
pub struct UriSigner {
    secret: Arc<str>,
}

impl UriSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    pub fn sign(&self, orcid: &str) -> Result<String, ServiceError> {
        Ok(sign_token(&self.secret, orcid)?)
    }

    /// The signed value, or `None` when the signature does not verify.
    pub fn verify(&self, signed: &str) -> Option<String> {
        verify_token(&self.secret, signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let signer = UriSigner::new("webhook-secret");
        let signed = signer.sign("0000-0002-1825-0097").unwrap();

        assert_eq!(signer.verify(&signed).as_deref(), Some("0000-0002-1825-0097"));
        assert_eq!(UriSigner::new("other").verify(&signed), None);
    }
}

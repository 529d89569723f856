use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// Generate the HMAC-SHA256 signature of `payload`, hex encoded.
pub fn generate_signature(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify an HMAC-SHA256 signature using constant-time comparison.
pub fn verify_signature(secret: &str, payload: &str, signature: &str) -> Result<bool, anyhow::Error> {
    let expected_signature = generate_signature(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

/// Produce a URL-safe token carrying `payload` and its signature:
/// `base64url(payload) "." hex(hmac)`.
pub fn sign_token(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
    let signature = generate_signature(secret, &encoded)?;

    Ok(format!("{}{}{}", encoded, SEPARATOR, signature))
}

/// Return the payload of a token produced by [`sign_token`], or `None` if the
/// token is malformed or its signature does not match.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    let (encoded, signature) = token.rsplit_once(SEPARATOR)?;

    if !verify_signature(secret, encoded, signature).ok()? {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::error;

use crate::services::auth::error::AuthError;

/// 32 bytes of OS entropy -> URL-safe base64 without padding.
///
/// Used for session ids and password reset tokens.
pub fn generate_opaque_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| {
        error!(error = %e, "getrandom failed");
        AuthError::Internal
    })?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// sha256(token) -> raw 32 bytes (stored as BYTEA). Raw tokens are never persisted.
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Comparison whose duration does not depend on where the inputs differ.
pub fn hashes_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

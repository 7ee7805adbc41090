use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, warn};

use crate::config::{AuthConfig, SigningConfig};
use crate::services::auth::error::AuthError;

const MIN_HS256_SECRET_LEN: usize = 32;

/// Signs and decodes JWTs for one issuer/audience pair.
///
/// Checks signature, `iss` and `aud`. Expiry is left to the caller, which
/// compares `exp` against its own clock so "expired" stays a distinct outcome.
#[derive(Clone)]
pub struct JwtCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("JwtCodec")
            .field("algorithm", &self.algorithm)
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtCodec {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.issuer.trim().is_empty() || config.audience.trim().is_empty() {
            return Err(AuthError::Signing("issuer and audience must be set".to_string()));
        }

        let (algorithm, encoding_key, decoding_key) = match &config.signing {
            SigningConfig::Hs256 { secret } => {
                if secret.len() < MIN_HS256_SECRET_LEN {
                    warn!("HS256 secret shorter than {} bytes", MIN_HS256_SECRET_LEN);
                    return Err(AuthError::Signing("HS256 secret too short".to_string()));
                }
                (
                    Algorithm::HS256,
                    EncodingKey::from_secret(secret.as_bytes()),
                    DecodingKey::from_secret(secret.as_bytes()),
                )
            }
            SigningConfig::EdDsa {
                private_key_pem,
                public_key_pem,
            } => {
                let encoding_key = EncodingKey::from_ed_pem(private_key_pem.as_bytes())
                    .map_err(|e| {
                        warn!(error = %e, "failed to parse JWT private key PEM (expected Ed25519 PKCS#8 PEM)");
                        AuthError::Signing("invalid Ed25519 private key".to_string())
                    })?;
                let decoding_key = DecodingKey::from_ed_pem(public_key_pem.as_bytes())
                    .map_err(|e| {
                        warn!(error = %e, "failed to parse JWT public key PEM");
                        AuthError::Signing("invalid Ed25519 public key".to_string())
                    })?;
                (Algorithm::EdDSA, encoding_key, decoding_key)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            AuthError::Signing(e.to_string())
        })
    }

    /// Any decoding failure (signature, issuer, audience, shape) is `TokenInvalid`.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        jsonwebtoken::decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "JWT rejected");
                AuthError::TokenInvalid
            })
    }
}

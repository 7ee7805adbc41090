/*
 * Responsibility
 * - Mint access/refresh token pairs bound to a session id
 * - Verify signature, issuer, audience, token kind and expiry
 * - Pure CPU: never touches the store or the cache
 */
use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::Role;
use crate::services::auth::claims::{AccessClaims, JwtClaims, RefreshClaims, TokenKind};
use crate::services::auth::error::AuthError;
use crate::services::auth::jwt::JwtCodec;

/// Who a token pair is minted for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub session_id: String,
}

#[derive(Clone)]
pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedPair")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TokenAuthority {
    codec: JwtCodec,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_seconds: i64,
}

impl TokenAuthority {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let seconds = |v: u64| i64::try_from(v).map_err(|_| AuthError::Signing("lifetime out of range".to_string()));

        let access_ttl = seconds(config.access_token_ttl_seconds)?;
        let refresh_ttl = seconds(config.refresh_token_ttl_seconds)?;
        if access_ttl <= 0 || refresh_ttl <= 0 {
            return Err(AuthError::Signing("token lifetimes must be positive".to_string()));
        }

        Ok(Self {
            codec: JwtCodec::new(config)?,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::seconds(access_ttl),
            refresh_ttl: Duration::seconds(refresh_ttl),
            leeway_seconds: seconds(config.token_leeway_seconds)?,
        })
    }

    /// New pair with the full configured lifetimes.
    pub fn issue_pair(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
    ) -> Result<IssuedPair, AuthError> {
        self.issue_pair_until(subject, now, None)
    }

    /// New pair whose refresh token never outlives `not_after`.
    ///
    /// Rotation uses this so a session keeps the expiry it was created with.
    pub fn issue_pair_until(
        &self,
        subject: &TokenSubject,
        now: DateTime<Utc>,
        not_after: Option<DateTime<Utc>>,
    ) -> Result<IssuedPair, AuthError> {
        let iat = now.timestamp();
        let access_exp = iat + self.access_ttl.num_seconds();
        let mut refresh_exp = iat + self.refresh_ttl.num_seconds();
        if let Some(limit) = not_after {
            refresh_exp = refresh_exp.min(limit.timestamp());
        }

        let access = self.claims(subject, TokenKind::Access, iat, access_exp);
        let refresh = self.claims(subject, TokenKind::Refresh, iat, refresh_exp);

        Ok(IssuedPair {
            access_token: self.codec.sign(&access)?,
            refresh_token: self.codec.sign(&refresh)?,
            access_expires_at: to_datetime(access_exp)?,
            refresh_expires_at: to_datetime(refresh_exp)?,
        })
    }

    pub fn verify_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, AuthError> {
        self.verify(token, TokenKind::Access, now)?.try_into()
    }

    pub fn verify_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, AuthError> {
        self.verify(token, TokenKind::Refresh, now)?.try_into()
    }

    fn claims(&self, subject: &TokenSubject, typ: TokenKind, iat: i64, exp: i64) -> JwtClaims {
        JwtClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: subject.user_id.to_string(),
            tid: subject.tenant_id,
            sid: subject.session_id.clone(),
            role: match typ {
                TokenKind::Access => Some(subject.role.clone()),
                TokenKind::Refresh => None,
            },
            typ,
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        }
    }

    // Signature/issuer/audience first, then kind, then expiry.
    fn verify(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let claims: JwtClaims = self.codec.decode(token)?;

        if claims.typ != kind {
            debug!(expected = ?kind, got = ?claims.typ, "token kind mismatch");
            return Err(AuthError::TokenInvalid);
        }

        if now.timestamp() >= claims.exp.saturating_add(self.leeway_seconds) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

fn to_datetime(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningConfig;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config() -> AuthConfig {
        let mut config = AuthConfig::new(
            "https://auth.test",
            "api",
            SigningConfig::Hs256 {
                secret: SECRET.to_string(),
            },
        );
        config.access_token_ttl_seconds = 600;
        config.refresh_token_ttl_seconds = 86_400;
        config.token_leeway_seconds = 10;
        config
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::MEMBER,
            session_id: "sid-1".to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn access_token_round_trips_identity() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let subject = subject();
        let pair = authority.issue_pair(&subject, t0()).unwrap();

        let claims = authority.verify_access_token(&pair.access_token, t0()).unwrap();
        assert_eq!(claims.user_id, subject.user_id);
        assert_eq!(claims.tenant_id, subject.tenant_id);
        assert_eq!(claims.role, Role::MEMBER);
        assert_eq!(claims.session_id, "sid-1");
        assert_eq!(claims.expires_at, t0() + Duration::seconds(600));
        assert_eq!(pair.refresh_expires_at, t0() + Duration::seconds(86_400));
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let pair = authority.issue_pair(&subject(), t0()).unwrap();

        assert_eq!(
            authority.verify_access_token(&pair.refresh_token, t0()),
            Err(AuthError::TokenInvalid)
        );
        assert_eq!(
            authority.verify_refresh_token(&pair.access_token, t0()),
            Err(AuthError::TokenInvalid)
        );
        assert!(authority.verify_refresh_token(&pair.refresh_token, t0()).is_ok());
    }

    #[test]
    fn expiry_is_distinct_from_invalid() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let pair = authority.issue_pair(&subject(), t0()).unwrap();

        // Inside the leeway window
        let late = t0() + Duration::seconds(605);
        assert!(authority.verify_access_token(&pair.access_token, late).is_ok());

        let expired = t0() + Duration::seconds(610);
        assert_eq!(
            authority.verify_access_token(&pair.access_token, expired),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn tampered_or_foreign_tokens_are_invalid() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let pair = authority.issue_pair(&subject(), t0()).unwrap();

        let mut tampered = pair.access_token.clone();
        tampered.push('x');
        assert_eq!(
            authority.verify_access_token(&tampered, t0()),
            Err(AuthError::TokenInvalid)
        );
        assert_eq!(
            authority.verify_access_token("not-a-jwt", t0()),
            Err(AuthError::TokenInvalid)
        );

        let mut other = config();
        other.issuer = "https://elsewhere.test".to_string();
        let foreign = TokenAuthority::new(&other).unwrap();
        let foreign_pair = foreign.issue_pair(&subject(), t0()).unwrap();
        assert_eq!(
            authority.verify_access_token(&foreign_pair.access_token, t0()),
            Err(AuthError::TokenInvalid)
        );
    }

    #[test]
    fn refresh_expiry_is_capped() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let cap = t0() + Duration::hours(1);
        let pair = authority
            .issue_pair_until(&subject(), t0(), Some(cap))
            .unwrap();
        assert_eq!(pair.refresh_expires_at, cap);

        let claims = authority
            .verify_refresh_token(&pair.refresh_token, t0())
            .unwrap();
        assert_eq!(claims.expires_at, cap);
    }

    #[test]
    fn rotated_pairs_differ() {
        let authority = TokenAuthority::new(&config()).unwrap();
        let subject = subject();
        let a = authority.issue_pair(&subject, t0()).unwrap();
        let b = authority.issue_pair(&subject, t0()).unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
    }

    #[test]
    fn short_secret_is_a_signing_error() {
        let mut config = config();
        config.signing = SigningConfig::Hs256 {
            secret: "short".to_string(),
        };
        assert!(matches!(
            TokenAuthority::new(&config),
            Err(AuthError::Signing(_))
        ));
    }
}

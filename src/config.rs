/*
 * Responsibility
 * - Load settings from the environment (.env first): listen address, DATABASE_URL,
 *   REDIS_URL, CORS allowlist, token/session policy
 * - Validate them (missing or invalid -> startup fails)
 * - Build one immutable value; services receive it by reference
 */
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Key material for signing and verifying tokens.
#[derive(Clone)]
pub enum SigningConfig {
    /// Shared secret, at least 32 bytes.
    Hs256 { secret: String },
    /// Ed25519 keys in PKCS#8 / SPKI PEM.
    EdDsa {
        private_key_pem: String,
        public_key_pem: String,
    },
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            Self::Hs256 { .. } => f.write_str("Hs256 { .. }"),
            Self::EdDsa { .. } => f.write_str("EdDsa { .. }"),
        }
    }
}

/// Token and session policy shared by the Token Authority and the Session Manager.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub signing: SigningConfig,
    // Token lifetimes (seconds)
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub token_leeway_seconds: u64,
    // Upper bound on how long a revoked session may still authenticate.
    pub session_cache_ttl_seconds: u64,
    // Inactive sessions are kept this long (audit) before the sweep removes them.
    pub session_retention_seconds: u64,
    pub session_cleanup_interval_seconds: u64,
    pub password_reset_ttl_seconds: u64,
    pub store_timeout_ms: u64,
    pub revoke_on_refresh_reuse: bool,
    pub policy_file: Option<PathBuf>,
}

impl AuthConfig {
    /// Policy with default lifetimes around the given identity and key material.
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, signing: SigningConfig) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            signing,
            access_token_ttl_seconds: 900,      // 15 min
            refresh_token_ttl_seconds: 2_592_000, // 30 days
            token_leeway_seconds: 30,
            session_cache_ttl_seconds: 5,
            session_retention_seconds: 2_592_000,
            session_cleanup_interval_seconds: 600,
            password_reset_ttl_seconds: 1_800,
            store_timeout_ms: 2_000,
            revoke_on_refresh_reuse: true,
            policy_file: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer = env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;
        let audience =
            env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let signing = match env::var("AUTH_SIGNING_ALG")
            .unwrap_or_else(|_| "HS256".to_string())
            .to_ascii_uppercase()
            .as_str()
        {
            "HS256" => {
                let secret = env::var("AUTH_JWT_SECRET")
                    .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::Invalid("AUTH_JWT_SECRET"));
                }
                SigningConfig::Hs256 { secret }
            }
            "EDDSA" => SigningConfig::EdDsa {
                private_key_pem: env::var("ACCESS_JWT_PRIVATE_KEY_PEM")
                    .map_err(|_| ConfigError::Missing("ACCESS_JWT_PRIVATE_KEY_PEM"))?
                    .replace("\\n", "\n"),
                public_key_pem: env::var("ACCESS_JWT_PUBLIC_KEY_PEM")
                    .map_err(|_| ConfigError::Missing("ACCESS_JWT_PUBLIC_KEY_PEM"))?
                    .replace("\\n", "\n"),
            },
            _ => return Err(ConfigError::Invalid("AUTH_SIGNING_ALG")),
        };

        let mut auth = Self::new(issuer, audience, signing);
        auth.access_token_ttl_seconds =
            env_or("ACCESS_TOKEN_TTL_SECONDS", auth.access_token_ttl_seconds);
        auth.refresh_token_ttl_seconds =
            env_or("REFRESH_TOKEN_TTL_SECONDS", auth.refresh_token_ttl_seconds);
        auth.token_leeway_seconds = env_or("TOKEN_LEEWAY_SECONDS", auth.token_leeway_seconds);
        auth.session_cache_ttl_seconds =
            env_or("SESSION_CACHE_TTL_SECONDS", auth.session_cache_ttl_seconds);
        auth.session_retention_seconds =
            env_or("SESSION_RETENTION_SECONDS", auth.session_retention_seconds);
        auth.session_cleanup_interval_seconds = env_or(
            "SESSION_CLEANUP_INTERVAL_SECONDS",
            auth.session_cleanup_interval_seconds,
        );
        auth.password_reset_ttl_seconds =
            env_or("PASSWORD_RESET_TTL_SECONDS", auth.password_reset_ttl_seconds);
        auth.store_timeout_ms = env_or("STORE_TIMEOUT_MS", auth.store_timeout_ms);
        auth.revoke_on_refresh_reuse =
            env_or("REVOKE_ON_REFRESH_REUSE", auth.revoke_on_refresh_reuse);
        auth.policy_file = env::var("AUTH_POLICY_FILE").ok().map(PathBuf::from);

        if auth.access_token_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("ACCESS_TOKEN_TTL_SECONDS"));
        }
        if auth.refresh_token_ttl_seconds <= auth.access_token_ttl_seconds {
            return Err(ConfigError::Invalid("REFRESH_TOKEN_TTL_SECONDS"));
        }
        if auth.session_cleanup_interval_seconds == 0 {
            return Err(ConfigError::Invalid("SESSION_CLEANUP_INTERVAL_SECONDS"));
        }

        Ok(auth)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub database_url: String,
    pub redis_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = env_or("AUTH_PORT", 4000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("AUTH_PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout_seconds = env_or("REQUEST_TIMEOUT_SECONDS", 10);

        Ok(Config {
            addr,
            app_env,
            database_url,
            redis_url,
            cors_allowed_origins,
            request_timeout_seconds,
            auth: AuthConfig::from_env()?,
        })
    }
}

// Unset or unparsable -> default.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

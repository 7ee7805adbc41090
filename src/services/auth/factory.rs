/// Factory: build the `SessionManager` (and its `TokenAuthority`) from `AuthConfig`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::repos::CredentialStore;
use crate::services::auth::{AuthError, SessionManager, TokenAuthority};
use crate::services::cache::CacheClient;
use crate::services::clock::SystemClock;
use crate::services::password::Argon2Hasher;

pub fn build_session_manager(
    config: &AuthConfig,
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn CacheClient>,
) -> Result<Arc<SessionManager>, AuthError> {
    let tokens = TokenAuthority::new(config)?;

    Ok(Arc::new(SessionManager::new(
        config,
        store,
        cache,
        tokens,
        Arc::new(Argon2Hasher),
        Arc::new(SystemClock),
    )))
}

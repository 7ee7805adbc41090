pub mod error;
pub mod memory;
pub mod postgres;
pub mod reset_token_repo;
pub mod retry;
pub mod session_repo;
pub mod store;
pub mod user_repo;

pub use error::{RepoError, RepoResult};
pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;
pub use retry::RetryOnce;
pub use store::CredentialStore;

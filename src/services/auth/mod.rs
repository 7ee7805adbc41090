pub mod claims;
pub mod error;
pub mod factory;
pub mod jwt;
pub mod liveness;
pub mod password_reset;
pub mod secrets;
pub mod session_manager;
pub mod token_authority;

pub use claims::{AccessClaims, RefreshClaims, TokenKind};
pub use error::AuthError;
pub use factory::build_session_manager;
pub use liveness::{Liveness, LookupTier};
pub use password_reset::PasswordResetGrant;
pub use session_manager::{LoginOutcome, SessionManager};
pub use token_authority::{IssuedPair, TokenAuthority, TokenSubject};

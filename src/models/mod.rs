//! Entities shared by the store, the session lifecycle and the policy layer.

pub mod reset_token;
pub mod role;
pub mod session;
pub mod user;

pub use reset_token::{NewPasswordResetToken, PasswordResetToken};
pub use role::Role;
pub use session::{NewSession, Session, SessionStatus};
pub use user::{NewUser, User, UserStatus, UserUpdate, normalize_email};

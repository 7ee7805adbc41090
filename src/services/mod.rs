pub mod auth;
pub mod authz;
pub mod cache;
pub mod clock;
pub mod password;

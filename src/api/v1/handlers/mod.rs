pub mod admin;
pub mod auth;
pub mod health;
pub mod password_reset;
pub mod sessions;

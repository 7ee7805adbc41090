//! Multi-tenant authentication and session authority.
//!
//! - [`services::auth::TokenAuthority`]: mints and verifies access/refresh tokens
//! - [`services::auth::SessionManager`]: session lifecycle and liveness
//! - [`services::authz::Authorizer`]: role and permission decisions
//!
//! The HTTP surface (`api`, `middleware`, `app`) is thin glue over these.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repos;
pub mod services;
pub mod state;

pub mod engine;
pub mod policy;

pub use engine::Authorizer;
pub use policy::{Grant, PermissionPolicy, PolicyError};

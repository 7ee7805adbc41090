/*
 * Responsibility
 * - Public interface of the middleware modules
 */
pub mod auth;
pub mod cors;
pub mod http;

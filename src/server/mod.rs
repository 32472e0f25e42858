//! GearGuard reference API server.
//!
//! Serves the Request API, Reference Data Service and Auth API over an
//! in-memory document store, optionally mirrored to a JSON file.
//!
//! ## Module map
//!
//! - [`api`]: axum router, handlers and the envelope-shaped `ApiError`
//! - [`auth`]: password hashing, session tokens, the `AuthUser` extractor
//! - [`db`]: document collections and the `DbHandle` used by handlers
//! - [`app`]: `ServerConfig`, router assembly and the serve loop

pub mod api;
pub mod app;
pub mod auth;
pub mod db;

pub use app::{ServerConfig, build_router, serve_on, start_server};

//! setcache: offline-friendly client core for a workout-tracking service.
//!
//! The crate is organized around three layers:
//!
//! - [`api`]: authenticated REST client with transparent access-token
//!   refresh (single coordinated exchange, queued replay)
//! - [`cache`]: TTL-based collection cache with stale-while-revalidate
//!   loads and optimistic deletes
//! - [`store`]: JSON-file key-value store backing caches, session, and
//!   in-progress workout drafts
//!
//! [`app`] wires them into the CLI commands.

pub mod analytics;
pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;

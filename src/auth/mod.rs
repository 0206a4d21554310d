//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionStore`: explicit tagged session state (anonymous or
//!   authenticated with a token pair), persisted through the store
//! - `CredentialStore`: optional remember-password storage via the OS
//!   keychain

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{SessionState, SessionStore};

//! Core authentication and credential-lifecycle subsystem.
//!
//! Everything with a real invariant lives here: password hashing, opaque
//! token generation and digesting, session token issuance/verification, and
//! the orchestrator state machine that ties them to the account store and the
//! notifier. The HTTP layer in [`crate::api`] is a thin marshaling shell over
//! these modules.

mod config;
mod error;
pub mod notifier;
mod password;
pub mod rate_limit;
pub mod session;
mod service;
pub mod store;
mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use password::CredentialHasher;
pub use service::{AuthService, LoginOutcome, ProfileChanges, ProvisionInput, RegisterInput};
pub use token::{generate_opaque_token, hash_token};

#[cfg(test)]
mod tests;

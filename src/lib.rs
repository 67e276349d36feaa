//! # Gatehouse (User Accounts & Authentication)
//!
//! `gatehouse` is a user account and authentication service. It handles
//! registration, password-based login, email verification, password reset,
//! and profile management over HTTP.
//!
//! ## Credentials & Tokens
//!
//! - **Passwords** are hashed with Argon2id (salted, configurable work
//!   factor). The database only ever sees PHC strings.
//! - **One-time tokens** (password reset, email verification) are 256-bit
//!   random values. Only their SHA-256 digest is stored; the raw token is
//!   delivered once via email and matched by digest on the way back.
//! - **Sessions** are stateless signed bearer tokens (HS256) carrying the
//!   public identity claim. There is no server-side session store and no
//!   revocation list: a token stays valid until its embedded expiry, even if
//!   the account is later deleted or its password changed.
//!
//! ## Anti-Enumeration
//!
//! Flows keyed by email (`forgot-password`, `resend-verification`) return the
//! same response whether or not the address belongs to an account, so callers
//! cannot probe for registered emails. Token-consumption failures collapse to
//! a single "invalid or expired" error regardless of cause.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

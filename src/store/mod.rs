//! Concrete [`crate::auth::store::AccountStore`] implementations.
//!
//! [`PgAccountStore`] is the production backend; [`MemoryAccountStore`] backs
//! the test suites and needs no running database.

mod memory;
mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

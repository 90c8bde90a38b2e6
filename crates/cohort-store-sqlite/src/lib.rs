//! SQLite backend for Cohort.
//!
//! Every statement runs on the single connection thread owned by
//! [`tokio_rusqlite`]; committed mutations are announced on the store's
//! change feed.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

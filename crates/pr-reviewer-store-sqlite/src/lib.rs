//! SQLite backend for the PR reviewer service.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every unit of work is one SQLite
//! transaction; write units start with `BEGIN IMMEDIATE`.

mod encode;
mod queries;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;

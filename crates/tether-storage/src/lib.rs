//! Tether Storage Layer
//!
//! SQLite-based persistence for the only state that outlives the host
//! process: permission policies the user chose to remember. Sessions,
//! tokens and nonces are never written here.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

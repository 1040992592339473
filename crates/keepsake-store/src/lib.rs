//! # keepsake-store
//!
//! Persistence for guest photo records. The crate exposes the
//! [`PhotoRepository`] trait plus two implementations: an in-memory one for
//! tests and development, and a SQLite one backed by a synchronous
//! [`Database`] handle with versioned migrations.

pub mod database;
pub mod migrations;
pub mod photos;
pub mod repository;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use repository::{MemoryPhotoRepository, PhotoRepository, SqlitePhotoRepository};

//! # keepsake-shared
//!
//! Domain types and pure helpers used by both the store and the server:
//! photo records and their moderation status, the upload acceptance policy,
//! storage-key naming, web image optimization, and guestbook sentiment.

pub mod constants;
pub mod error;
pub mod optimize;
pub mod policy;
pub mod sentiment;
pub mod types;

pub use error::{OptimizeError, UploadError};
pub use optimize::{optimize_for_web, OptimizedImage};
pub use policy::UploadPolicy;
pub use sentiment::Sentiment;
pub use types::*;

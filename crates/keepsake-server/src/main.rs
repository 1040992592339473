//! # keepsake-server
//!
//! HTTP backend for the wedding keepsake site.
//!
//! This binary provides:
//! - **Guest photo uploads**: validate, optimize for the web, store in the
//!   blob store, and record each photo as pending or approved
//! - **Guestbook** submissions with thank-you emails
//! - **In-memory analytics** for photo views, guestbook entries, and uploads
//! - **Admin routes** (shared-key auth) for moderation and anniversary mail
//! - **Media serving** for the filesystem blob store

mod analytics;
mod api;
mod blob_store;
mod config;
mod error;
mod mailer;
mod pipeline;
mod templates;
mod visitor;

use std::sync::Arc;

use keepsake_store::{MemoryPhotoRepository, PhotoRepository, SqlitePhotoRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::blob_store::FsBlobStore;
use crate::config::ServerConfig;
use crate::mailer::{HttpMailer, LogMailer, Mailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keepsake_server=debug")),
        )
        .init();

    info!("Starting keepsake server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        site = %config.site_name,
        require_approval = config.require_approval,
        max_upload_size = config.upload_policy.max_size,
        formats = ?config.upload_policy.allowed_formats,
        popularity_threshold = config.popularity_threshold,
        admin_enabled = config.admin_key.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize collaborators
    // -----------------------------------------------------------------------

    // Blob store (creates directory if missing)
    let blob_store = Arc::new(
        FsBlobStore::new(
            config.blob_storage_path.clone(),
            config.public_base_url.clone(),
        )
        .await?,
    );

    let repository: Arc<dyn PhotoRepository> = match &config.database_path {
        Some(path) => {
            info!(path = %path.display(), "Using SQLite photo repository");
            Arc::new(SqlitePhotoRepository::open(path)?)
        }
        None => {
            info!("DATABASE_PATH not set, photo records are kept in memory");
            Arc::new(MemoryPhotoRepository::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.email_api_url {
        Some(url) => {
            info!(endpoint = %url, "Using HTTP email API");
            Arc::new(HttpMailer::new(url.clone(), config.email_api_key.clone()))
        }
        None => Arc::new(LogMailer),
    };

    let http_addr = config.http_addr;
    let app_state = AppState::new(config, blob_store, repository, mailer);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

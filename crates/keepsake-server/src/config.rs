//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use keepsake_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_MAX_FILES_PER_UPLOAD, DEFAULT_POPULARITY_THRESHOLD,
};
use keepsake_shared::UploadPolicy;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Directory where uploaded photo bytes are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./uploads`
    pub blob_storage_path: PathBuf,

    /// Base URL that blob keys are appended to when building `storageUrl`.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080/media`
    pub public_base_url: String,

    /// SQLite file for photo records. When unset, records live in memory.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Extension allow-list and per-file size cap.
    /// Env: `GUEST_UPLOAD_FORMATS` (comma list), `GUEST_UPLOAD_MAX_SIZE` (bytes)
    pub upload_policy: UploadPolicy,

    /// Maximum number of files in one upload request.
    /// Env: `GUEST_UPLOAD_MAX_FILES`
    /// Default: `10`
    pub max_files_per_upload: usize,

    /// Whether new guest photos start as `pending`.
    /// Env: `GUEST_UPLOAD_REQUIRE_APPROVAL` (`"true"` enables, anything else disables)
    /// Default: `true`
    pub require_approval: bool,

    /// Views needed before a photo counts as popular.
    /// Env: `POPULAR_PHOTOS_THRESHOLD`
    /// Default: `10`
    pub popularity_threshold: usize,

    /// Shared secret for the admin routes.
    /// Env: `ADMIN_KEY`
    /// Default: empty (admin routes always answer 401).
    pub admin_key: Option<String>,

    /// HTTP email API endpoint. When unset, emails are only logged.
    /// Env: `EMAIL_API_URL`
    pub email_api_url: Option<String>,

    /// Bearer token for the email API.
    /// Env: `EMAIL_API_KEY`
    pub email_api_key: Option<String>,

    /// Sender address for outgoing email.
    /// Env: `EMAIL_FROM`
    /// Default: `"Keepsake <noreply@localhost>"`
    pub email_from: String,

    /// Couple / site name used in email copy.
    /// Env: `SITE_NAME`
    /// Default: `"Our Wedding"`
    pub site_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            blob_storage_path: PathBuf::from("./uploads"),
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}/media"),
            database_path: None,
            upload_policy: UploadPolicy::default(),
            max_files_per_upload: DEFAULT_MAX_FILES_PER_UPLOAD,
            require_approval: true,
            popularity_threshold: DEFAULT_POPULARITY_THRESHOLD,
            admin_key: None,
            email_api_url: None,
            email_api_key: None,
            email_from: "Keepsake <noreply@localhost>".to_string(),
            site_name: "Our Wedding".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from an arbitrary source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = get("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(url) = get("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        config.database_path = non_empty(get("DATABASE_PATH")).map(PathBuf::from);

        // -- Guest uploads --

        if let Some(val) = get("GUEST_UPLOAD_MAX_SIZE") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.upload_policy.max_size = n,
                _ => tracing::warn!(value = %val, "Invalid GUEST_UPLOAD_MAX_SIZE, using default"),
            }
        }

        if let Some(list) = get("GUEST_UPLOAD_FORMATS") {
            let formats = UploadPolicy::parse_formats(&list);
            if formats.is_empty() {
                tracing::warn!(value = %list, "Empty GUEST_UPLOAD_FORMATS, using default");
            } else {
                config.upload_policy.allowed_formats = formats;
            }
        }

        if let Some(val) = get("GUEST_UPLOAD_MAX_FILES") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_files_per_upload = n,
                _ => tracing::warn!(value = %val, "Invalid GUEST_UPLOAD_MAX_FILES, using default"),
            }
        }

        if let Some(val) = get("GUEST_UPLOAD_REQUIRE_APPROVAL") {
            config.require_approval = val == "true";
        }

        if let Some(val) = get("POPULAR_PHOTOS_THRESHOLD") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.popularity_threshold = n,
                _ => tracing::warn!(value = %val, "Invalid POPULAR_PHOTOS_THRESHOLD, using default"),
            }
        }

        // -- Admin & email --

        config.admin_key = non_empty(get("ADMIN_KEY"));
        config.email_api_url = non_empty(get("EMAIL_API_URL"));
        config.email_api_key = non_empty(get("EMAIL_API_KEY"));

        if let Some(from) = non_empty(get("EMAIL_FROM")) {
            config.email_from = from;
        }
        if let Some(name) = non_empty(get("SITE_NAME")) {
            config.site_name = name;
        }

        config
    }

    /// Request body cap for the upload route: every file at max size plus
    /// room for the text fields and multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        self.upload_policy
            .max_size
            .saturating_mul(self.max_files_per_upload)
            .saturating_add(1024 * 1024)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.require_approval);
        assert_eq!(config.popularity_threshold, 10);
        assert_eq!(config.upload_policy.max_size, 10 * 1024 * 1024);
        assert_eq!(config.max_files_per_upload, 10);
        assert!(config.admin_key.is_none());
    }

    #[test]
    fn test_require_approval_only_true_enables() {
        let config = ServerConfig::from_lookup(lookup(&[("GUEST_UPLOAD_REQUIRE_APPROVAL", "true")]));
        assert!(config.require_approval);
        let config = ServerConfig::from_lookup(lookup(&[("GUEST_UPLOAD_REQUIRE_APPROVAL", "yes")]));
        assert!(!config.require_approval);
        let config = ServerConfig::from_lookup(lookup(&[("GUEST_UPLOAD_REQUIRE_APPROVAL", "false")]));
        assert!(!config.require_approval);
    }

    #[test]
    fn test_upload_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("GUEST_UPLOAD_MAX_SIZE", "2048"),
            ("GUEST_UPLOAD_FORMATS", "png, GIF"),
            ("POPULAR_PHOTOS_THRESHOLD", "3"),
            ("PUBLIC_BASE_URL", "https://cdn.example.com/photos/"),
        ]));
        assert_eq!(config.upload_policy.max_size, 2048);
        assert_eq!(config.upload_policy.allowed_formats, vec!["png", "gif"]);
        assert_eq!(config.popularity_threshold, 3);
        assert_eq!(config.public_base_url, "https://cdn.example.com/photos");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("GUEST_UPLOAD_MAX_SIZE", "lots"),
            ("POPULAR_PHOTOS_THRESHOLD", "0"),
            ("ADMIN_KEY", "   "),
        ]));
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.upload_policy.max_size, 10 * 1024 * 1024);
        assert_eq!(config.popularity_threshold, 10);
        assert!(config.admin_key.is_none());
    }
}

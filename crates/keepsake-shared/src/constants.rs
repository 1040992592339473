/// Application name used in email footers and logs
pub const APP_NAME: &str = "Keepsake";

/// Storage-key prefix for every guest-submitted photo
pub const GUEST_UPLOAD_PREFIX: &str = "guest-uploads/";

/// Category tag stamped on guest-sourced photo records
pub const GUEST_UPLOAD_CATEGORY: &str = "guest-upload";

/// Metadata marker attached to guest uploads in the blob store
pub const UPLOAD_TYPE_GUEST_PHOTO: &str = "guest-photo";

/// Default per-file size cap in bytes (10 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Default extension allow-list for guest uploads
pub const DEFAULT_UPLOAD_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

/// Maximum files accepted in one upload request
pub const DEFAULT_MAX_FILES_PER_UPLOAD: usize = 10;

/// Longest edge of an optimized image, in pixels
pub const MAX_IMAGE_DIMENSION: u32 = 1920;

/// JPEG quality used when re-encoding uploads
pub const JPEG_QUALITY: u8 = 85;

/// View count at which a photo counts as popular
pub const DEFAULT_POPULARITY_THRESHOLD: usize = 10;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

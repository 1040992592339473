use thiserror::Error;

/// Reasons a single guest file is refused before it reaches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File has no extension")]
    MissingExtension,

    #[error("File type .{extension} is not allowed (allowed: {allowed})")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("File is too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("File is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("Image decode/encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Optimization task failed: {0}")]
    Task(String),
}

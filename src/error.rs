use thiserror::Error;

/// Errors raised while loading the group configuration store
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    /// The configuration file is not valid TOML
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value of the wrong type
    #[error("Config key '{key}' must be {expected}")]
    Type { key: String, expected: &'static str },

    /// A required key is absent
    #[error("Missing required config key: {0}")]
    Missing(String),

    /// A key holds a well-typed but unusable value
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Errors from the pixel engine behind an image backend
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Source file could not be opened
    #[error("Failed to open image {path}: {message}")]
    Open { path: String, message: String },

    /// Source bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Output could not be encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Font could not be loaded or text could not be laid out
    #[error("Font error: {0}")]
    Font(String),

    /// No encoder exists for the requested output extension
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// A crop, resize or paste box is empty or degenerate
    #[error("Invalid geometry: {0}")]
    Geometry(String),
}

/// Errors surfaced by the thumbnail pipeline to the request boundary.
///
/// Canonical-name mismatches are not errors; they are reported as redirects
/// by the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ThumbError {
    /// Malformed filename, token grammar or request URL
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The group key in the path has no configuration
    #[error("Group not configured: '{key}'")]
    GroupNotConfigured { key: String },

    /// The resolved source image does not exist
    #[error("Source image not found: {path}")]
    SourceNotFound { path: String },

    /// The group's configured source root is not a directory
    #[error("Source root directory does not exist: {path}")]
    SourceRootMissing { path: String },

    /// Image engine failure while transforming
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Filesystem or subprocess failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ThumbError {
    fn from(err: std::io::Error) -> Self {
        ThumbError::Io(err.to_string())
    }
}

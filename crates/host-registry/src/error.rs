use std::path::PathBuf;

/// Errors that can occur in the extension registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested an extension that is not registered.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// Failed to parse an extension declaration file.
    #[error("failed to parse extension declaration: {0}")]
    DeclarationParse(#[from] toml::de::Error),

    /// Extension declaration file not found at the expected path.
    #[error("extension declaration not found: {0}")]
    DeclarationNotFound(PathBuf),

    /// Failed to serialize an extension declaration.
    #[error("failed to serialize extension declaration: {0}")]
    DeclarationSerialize(String),

    /// Invalid extension name.
    #[error("invalid extension name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Invalid semver version string.
    #[error("invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    /// Invalid version constraint string.
    #[error("invalid version constraint '{constraint}': {reason}")]
    ConstraintParse { constraint: String, reason: String },

    /// Malformed dependency declaration.
    #[error("invalid dependency '{raw}': {reason}")]
    InvalidDependency { raw: String, reason: String },

    /// A source file could not be loaded.
    #[error("failed to load {file} for extension '{extension}': {reason}")]
    Load {
        extension: String,
        file: PathBuf,
        reason: String,
    },

    /// I/O error reading extension files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

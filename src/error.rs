use std::path::PathBuf;

use thiserror::Error;

/// Machine-readable discriminator shared by every error in the crate.
///
/// The upstream HTTP layer maps these onto status codes; the human-readable
/// message travels separately in [`crate::models::Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ReadError,
    IOError,
    LockError,
    ThumbnailError,
    ValidationError,
    NotFoundError,
    InvalidTokenError,
    /// Password did not match the stored hash
    CredentialsError,
    HashError,
    ConfigError,
}

/// Errors raised by the catalog, its backing store, and thumbnail generation.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Backing file missing, unreadable, or not valid JSON
    #[error("Could not read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    /// Filesystem failure (mkdir, write, rm)
    #[error("I/O error: {0}")]
    Io(String),

    /// Lock not acquired within the retry budget
    #[error("Could not lock {} after {attempts} attempts", .path.display())]
    Lock { path: PathBuf, attempts: u32 },

    /// Poster decode or encode failure
    #[error("Could not update poster, please try again later ({0})")]
    Thumbnail(String),

    /// Caller-supplied value outside its domain
    #[error("{0}")]
    Validation(String),

    #[error("Movie Id {0} not in database!")]
    NotFound(i64),
}

impl CatalogError {
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn thumbnail(msg: impl Into<String>) -> Self {
        Self::Thumbnail(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } => ErrorKind::ReadError,
            Self::Io(_) => ErrorKind::IOError,
            Self::Lock { .. } => ErrorKind::LockError,
            Self::Thumbnail(_) => ErrorKind::ThumbnailError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFoundError,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Errors raised by the user/credential store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username {0} not in database!")]
    UnknownUser(String),

    #[error("Invalid credentials: {0}")]
    InvalidToken(String),

    /// Stored hash unparsable, or hashing itself failed
    #[error("Password hash error: {0}")]
    Hash(String),

    #[error("Auth configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownUser(_) => ErrorKind::NotFoundError,
            Self::InvalidToken(_) => ErrorKind::InvalidTokenError,
            Self::Hash(_) => ErrorKind::HashError,
            Self::Config(_) => ErrorKind::ConfigError,
        }
    }
}

/// Errors raised while loading [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Startup failure for [`crate::state::AppState`].
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

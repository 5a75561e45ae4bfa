//! Movie catalog backend core.
//!
//! A JSON file holds the movie list, a second one the last-updated marker,
//! and each movie's poster renditions live under `images/movies/{id}/`.
//! Writes are serialized through an advisory file lock. Users and their
//! argon2 hashes come from a read-only JSON file; logins produce HS256
//! bearer tokens.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod lock;
pub mod models;
pub mod state;
pub mod thumbnail;

pub use auth::AuthStore;
pub use catalog::MovieCatalog;
pub use config::Config;
pub use error::{AuthError, CatalogError, ConfigError, ErrorKind, StartupError};
pub use models::{Claims, Movie, MovieCandidate, MovieId, Outcome, Status, UserRecord};
pub use state::AppState;

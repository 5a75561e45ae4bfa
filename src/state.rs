use std::sync::Arc;

use crate::auth::AuthStore;
use crate::catalog::MovieCatalog;
use crate::config::Config;
use crate::error::StartupError;

/// Process-wide state handed to request handlers.
pub struct AppState {
    pub catalog: MovieCatalog,
    pub auth: AuthStore,
}

impl AppState {
    /// Open the catalog and user list. Call once before serving traffic.
    pub async fn initialize(config: &Config) -> Result<Arc<Self>, StartupError> {
        let catalog = MovieCatalog::open(config).await?;
        let auth = AuthStore::load(&config.users_file(), &config.token_key, config.token_ttl_days).await?;
        log::info!("catalog backend ready (data dir {})", config.data_dir.display());
        Ok(Arc::new(Self { catalog, auth }))
    }
}

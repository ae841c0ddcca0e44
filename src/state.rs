use std::sync::Arc;

use crate::config::Config;
use crate::crypto::token::TokenIssuer;
use crate::error::Result;
use crate::repositories::{
    book::{BookRepository, PgBookRepository},
    memory::{MemoryBookRepository, MemoryUserRepository},
    user::{PgUserRepository, UserRepository},
};
use crate::services::photos::PhotoStore;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Identity storage.
    pub users: Arc<dyn UserRepository>,
    /// Listing storage.
    pub books: Arc<dyn BookRepository>,
    /// Where uploaded photos are written.
    pub photos: PhotoStore,
    /// Signs and verifies credentials.
    pub tokens: TokenIssuer,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState`, backed by PostgreSQL when a database URL is
    /// configured and by in-memory stores otherwise.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("⚠️ DATABASE_URL not set, using in-memory stores (data is lost on exit)");
            return Ok(Self::in_memory(config));
        };

        let db = crate::db::create_pool(database_url)?;
        crate::db::run_migrations(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        Ok(Self::with_repositories(
            config,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgBookRepository::new(db)),
        ))
    }

    /// Creates an `AppState` over fresh in-memory stores.
    pub fn in_memory(config: &Config) -> Self {
        Self::with_repositories(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryBookRepository::new()),
        )
    }

    /// Creates an `AppState` over the given repositories.
    pub fn with_repositories(
        config: &Config,
        users: Arc<dyn UserRepository>,
        books: Arc<dyn BookRepository>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_expire_days);
        tracing::info!("✅ Token issuer initialized ({} day expiry)", config.jwt_expire_days);

        Self {
            users,
            books,
            photos: PhotoStore::new(config.file_upload_path.clone()),
            tokens,
            config: config.clone(),
        }
    }
}

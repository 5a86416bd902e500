//! Shared application state.

use std::sync::Arc;

use log::info;
use quill_core::db::r2::PooledConnection;
use quill_core::db::{ConnectionManager, ConnectionSpec};
use r2d2::Pool;

use crate::config::Config;
use crate::error::AppError;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pool: Pool<ConnectionManager>,
    config: Arc<Config>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool", &self.pool.state())
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    /// Wrap an existing pool.
    pub fn new(pool: Pool<ConnectionManager>, config: Config) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
        }
    }

    /// Open a pool for `config.database_url`.
    pub fn connect(config: Config) -> quill_core::Result<Self> {
        let spec: ConnectionSpec = config.database_url.parse()?;
        let backend = spec.backend_name.clone();
        let pool = build_pool(spec)?;
        info!(
            "Connected to {backend} database ({} connections)",
            pool.max_size()
        );
        Ok(AppState::new(pool, config))
    }

    /// The settings the app was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The connection pool.
    pub fn pool(&self) -> &Pool<ConnectionManager> {
        &self.pool
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&PooledConnection) -> quill_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?;
        Ok(result?)
    }
}

/// A pool for `spec`. An in-memory SQLite database only exists inside
/// the connection that opened it, so such pools hold exactly one.
pub fn build_pool(spec: ConnectionSpec) -> quill_core::Result<Pool<ConnectionManager>> {
    let single = spec.backend_name == "sqlite" && spec.conn_str == ":memory:";
    let mut builder = Pool::builder();
    if single {
        builder = builder.max_size(1);
    }
    Ok(builder.build(ConnectionManager::new(spec))?)
}

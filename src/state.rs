use std::sync::Arc;

use anyhow::Context;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::config::{AppConfig, StoreBackend};
use crate::session::{CookieStore, SessionStore};
use crate::store::{MemoryUserRepository, PgUserRepository, UserRepository};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// The server cannot run without the schema, so a failure here aborts startup.
async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(db).await.context("run migrations")?;
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserRepository> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres store backend")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                run_migrations(&db).await?;
                Arc::new(PgUserRepository::new(db))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserRepository::new())
            }
        };

        let sessions = Arc::new(
            CookieStore::new(
                config.session.key.as_bytes(),
                config.session.max_age_secs,
                config.session.secure,
            )
            .context("build session store")?,
        );

        Ok(Self::from_parts(users, sessions))
    }

    pub fn from_parts(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { users, sessions }
    }

    /// In-memory users and a cookie store with a fixed test key.
    #[cfg(test)]
    pub fn fake() -> Self {
        let sessions = CookieStore::new(b"test-session-key-test-session-key", 3600, false)
            .expect("test key is long enough");
        Self::from_parts(Arc::new(MemoryUserRepository::new()), Arc::new(sessions))
    }
}

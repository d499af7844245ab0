use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::password::{Argon2Hasher, CredentialHasher};
use crate::config::AppConfig;
use crate::users::{InMemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub hasher: Arc<dyn CredentialHasher>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let hasher = Arc::new(Argon2Hasher::default()) as Arc<dyn CredentialHasher>;

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; users are kept in memory");
            return Ok(Self {
                db: None,
                users: Arc::new(InMemoryUserStore::new()),
                config,
                hasher,
            });
        };

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            db: Some(db),
            config,
            hasher,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use argon2::Params;

        let config = Arc::new(AppConfig {
            database_url: None,
            admin: crate::config::AdminConfig {
                email: "admin@apnaride.com".into(),
                role: "admin".into(),
            },
            oauth_provider: crate::users::Provider::Google,
            frontend_url: "http://localhost:3000".into(),
        });

        let hasher = Argon2Hasher::with_params(Params::MIN_M_COST, 1, 1).expect("minimal argon2 params");

        Self {
            db: None,
            config,
            users: Arc::new(InMemoryUserStore::new()),
            hasher: Arc::new(hasher),
        }
    }
}

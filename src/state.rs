use crate::auth::{credentials::CredentialLoader, gate::AuthGate, password::{Argon2Hasher, PasswordHasher}};
use crate::config::{AppConfig, StoreKind};
use crate::users::{repo::PgUserStore, services::RegistrationService, store::{MemoryUserStore, UserStore}};
use anyhow::Context;
use axum::extract::FromRef;
use std::sync::Arc;
use tracing::{info, warn};

/// Every collaborator is built once here and handed down explicitly.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub registration: RegistrationService,
    pub gate: AuthGate,
}

impl FromRef<AppState> for AuthGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let hasher = Arc::new(Argon2Hasher::new(&config.hash)?) as Arc<dyn PasswordHasher>;

        let users = match config.store {
            StoreKind::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres store")?;
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("postgres user store ready");
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            StoreKind::Memory => {
                warn!("using in-memory user store; users are lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Self::from_parts(&config, users, hasher)
    }

    pub fn from_parts(
        config: &AppConfig,
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> anyhow::Result<Self> {
        let registration = RegistrationService::new(users.clone(), hasher.clone());
        let gate = AuthGate::new(CredentialLoader::new(users.clone()), hasher, &config.realm)?;
        Ok(Self {
            users,
            registration,
            gate,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::HashConfig;

        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreKind::Memory,
            database_url: None,
            db_max_connections: 1,
            realm: "test".into(),
            hash: HashConfig {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
        };
        let hasher = Arc::new(crate::auth::password::test_hasher()) as Arc<dyn PasswordHasher>;
        let users = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
        Self::from_parts(&config, users, hasher).expect("fake state")
    }
}

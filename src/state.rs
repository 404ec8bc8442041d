use std::sync::Arc;

use anyhow::Context;

use crate::auth::ledger::{InMemoryTokenLedger, MongoTokenLedger, TokenLedger};
use crate::config::{AppConfig, JwtConfig, MongoConfig};
use crate::db;
use crate::users::{
    mongo::MongoUserStore,
    repo::{InMemoryUserStore, UserStore},
};

/// Store handles and config, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn TokenLedger>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config.mongo).await.context("connect to database")?;

        let users = MongoUserStore::new(&db);
        users.ensure_indexes().await.context("create user indexes")?;
        let ledger = MongoTokenLedger::new(&db);
        ledger.ensure_indexes().await.context("create token indexes")?;

        Ok(Self {
            users: Arc::new(users),
            ledger: Arc::new(ledger),
            config,
        })
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn TokenLedger>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            ledger,
            config,
        }
    }

    /// In-memory stores and fixed test secrets; nothing touches the network.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            mongo: MongoConfig {
                url: "mongodb://localhost:27017".into(),
                database: "accounts-test".into(),
            },
            jwt: JwtConfig {
                access_secret: "test-access".into(),
                refresh_secret: "test-refresh".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                access_ttl_seconds: 5 * 60,
                refresh_ttl_seconds: 60 * 60,
            },
        });
        Self::from_parts(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTokenLedger::new()),
            config,
        )
    }
}

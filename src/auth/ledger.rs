//! Token ledger: the record of revoked tokens.
//!
//! A token present in the ledger can no longer be used, whatever its signature
//! says. Entries only need to live until the token would have expired on its
//! own, so both implementations drop them after `expires_at`.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::claims::TokenKind;
use crate::db::{from_bson_datetime, is_duplicate_key, to_bson_datetime, StoreError, StoreResult};

/// A revoked token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub kind: TokenKind,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl TokenRecord {
    pub fn new(token: &str, kind: TokenKind, user_id: Uuid, expires_at: OffsetDateTime) -> Self {
        Self {
            token: token.to_string(),
            kind,
            user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at,
        }
    }

    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Persist a record. Recording the same token twice is not an error.
    async fn record(&self, record: TokenRecord) -> StoreResult<()>;

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<TokenRecord>>;

    async fn exists(&self, token: &str) -> StoreResult<bool> {
        Ok(self.find_by_token(token).await?.is_some())
    }

    /// Mark a token as no longer usable.
    async fn revoke(
        &self,
        token: &str,
        kind: TokenKind,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.record(TokenRecord::new(token, kind, user_id, expires_at))
            .await
    }

    async fn is_revoked(&self, token: &str) -> StoreResult<bool> {
        self.exists(token).await
    }
}

/// Process-local ledger, used by tests and `AppState::fake`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenLedger {
    records: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn record(&self, record: TokenRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let now = OffsetDateTime::now_utc();
        records.retain(|_, r| r.is_live(now));
        records.entry(record.token.clone()).or_insert(record);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        let records = self.records.read().await;
        let now = OffsetDateTime::now_utc();
        Ok(records.get(token).filter(|r| r.is_live(now)).cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenDocument {
    token: String,
    kind: TokenKind,
    user_id: String,
    created_at: BsonDateTime,
    expires_at: BsonDateTime,
}

impl From<&TokenRecord> for TokenDocument {
    fn from(r: &TokenRecord) -> Self {
        Self {
            token: r.token.clone(),
            kind: r.kind,
            user_id: r.user_id.to_string(),
            created_at: to_bson_datetime(r.created_at),
            expires_at: to_bson_datetime(r.expires_at),
        }
    }
}

impl TryFrom<TokenDocument> for TokenRecord {
    type Error = StoreError;

    fn try_from(d: TokenDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&d.user_id)
                .map_err(|e| StoreError::Corrupt(format!("token user_id: {e}")))?,
            token: d.token,
            kind: d.kind,
            created_at: from_bson_datetime(d.created_at),
            expires_at: from_bson_datetime(d.expires_at),
        })
    }
}

/// MongoDB ledger backed by the `revoked_tokens` collection.
#[derive(Clone)]
pub struct MongoTokenLedger {
    collection: Collection<TokenDocument>,
}

impl MongoTokenLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<TokenDocument>("revoked_tokens"),
        }
    }

    /// Unique `token` index, plus a TTL index so MongoDB evicts entries once
    /// the token has expired anyway.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = IndexModel::builder()
            .keys(doc! { "token": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let ttl = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(std::time::Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.collection.create_indexes([unique, ttl]).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenLedger for MongoTokenLedger {
    #[instrument(skip(self, record), fields(kind = ?record.kind, user_id = %record.user_id))]
    async fn record(&self, record: TokenRecord) -> StoreResult<()> {
        match self.collection.insert_one(TokenDocument::from(&record)).await {
            Ok(_) => {
                debug!("token recorded");
                Ok(())
            }
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all)]
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        // The TTL monitor runs about once a minute, so filter on expiry too.
        let filter = doc! {
            "token": token,
            "expires_at": { "$gt": BsonDateTime::now() },
        };
        self.collection
            .find_one(filter)
            .await?
            .map(TokenRecord::try_from)
            .transpose()
    }
}

use std::time::Duration;

use mongodb::{
    bson::DateTime as BsonDateTime,
    error::{ErrorKind, WriteFailure},
    options::ClientOptions,
    Client, Database,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{config::MongoConfig, error::ApiError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email address already exists")]
    DuplicateEmail,

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            other => ApiError::internal(other),
        }
    }
}

/// Connects and pings the server.
pub async fn connect(cfg: &MongoConfig) -> anyhow::Result<Database> {
    info!("connecting to MongoDB");
    let mut options = ClientOptions::parse(&cfg.url).await?;
    options.max_pool_size = Some(10);
    options.connect_timeout = Some(Duration::from_secs(10));
    options.server_selection_timeout = Some(Duration::from_secs(30));
    options.app_name = Some("accounts".into());

    let client = Client::with_options(options)?;
    let db = client.database(&cfg.database);
    db.run_command(mongodb::bson::doc! { "ping": 1 }).await?;
    info!(database = %cfg.database, "connected to MongoDB");
    Ok(db)
}

/// E11000: a unique index rejected the write.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

pub(crate) fn to_bson_datetime(t: OffsetDateTime) -> BsonDateTime {
    BsonDateTime::from_millis((t.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub(crate) fn from_bson_datetime(d: BsonDateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(d.timestamp_millis() as i128 * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

//! MongoDB implementation of `UserStore`.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    repo::UserStore,
    repo_types::{Gender, NewUser, User, UserFilter},
};
use crate::db::{
    from_bson_datetime, is_duplicate_key, to_bson_datetime, StoreError, StoreResult,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    email: String,
    password_hash: String,
    #[serde(default)]
    gender: Gender,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl From<&User> for UserDocument {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            name: u.name.clone(),
            email: u.email.clone(),
            password_hash: u.password_hash.clone(),
            gender: u.gender,
            created_at: to_bson_datetime(u.created_at),
            updated_at: to_bson_datetime(u.updated_at),
        }
    }
}

impl TryFrom<UserDocument> for User {
    type Error = StoreError;

    fn try_from(d: UserDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&d.id).map_err(|e| StoreError::Corrupt(format!("user _id: {e}")))?,
            name: d.name,
            email: d.email,
            password_hash: d.password_hash,
            gender: d.gender,
            created_at: from_bson_datetime(d.created_at),
            updated_at: from_bson_datetime(d.updated_at),
        })
    }
}

fn map_write_err(e: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&e) {
        StoreError::DuplicateEmail
    } else {
        e.into()
    }
}

/// Users live in the `users` collection, keyed by a UUID string `_id`.
#[derive(Clone)]
pub struct MongoUserStore {
    collection: Collection<UserDocument>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<UserDocument>("users"),
        }
    }

    /// Unique index on `email`; this is what settles concurrent sign-ups.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(model).await?;
        Ok(())
    }

    fn build_filter(filter: &UserFilter) -> Document {
        let mut doc = doc! {};
        if let Some(gender) = filter.gender {
            let value = match gender {
                Gender::Male => "Male",
                Gender::Female => "Female",
            };
            doc.insert("gender", value);
        }
        doc
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    #[instrument(skip(self, user))]
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let user = user.into_user(Uuid::new_v4());
        self.collection
            .insert_one(UserDocument::from(&user))
            .await
            .map_err(map_write_err)?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.collection
            .find_one(doc! { "_id": id.to_string() })
            .await?
            .map(User::try_from)
            .transpose()
    }

    #[instrument(skip_all)]
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.collection
            .find_one(doc! { "email": email })
            .await?
            .map(User::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        let cursor = self
            .collection
            .find(Self::build_filter(&filter))
            .sort(doc! { "created_at": 1 })
            .await?;
        let docs: Vec<UserDocument> = cursor.try_collect().await?;
        docs.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, mut user: User) -> StoreResult<Option<User>> {
        user.updated_at = OffsetDateTime::now_utc();
        let result = self
            .collection
            .replace_one(doc! { "_id": user.id.to_string() }, UserDocument::from(&user))
            .await
            .map_err(map_write_err)?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        info!("user updated");
        Ok(Some(user))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(result.deleted_count > 0)
    }
}

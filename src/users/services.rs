use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    dto::{RegisterRequest, UpdateUserRequest},
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::{
    auth::password::hash_password,
    error::{ApiError, ApiResult},
};

fn hash(plain: &str) -> ApiResult<String> {
    hash_password(plain).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::internal(e)
    })
}

/// Hashes the password, then inserts. The store's uniqueness check decides
/// duplicate emails, so two racing sign-ups still produce one record.
pub async fn register_user(store: &dyn UserStore, req: RegisterRequest) -> ApiResult<User> {
    let gender = req.gender();
    let password_hash = hash(&req.password)?;
    let user = store
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
            gender,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "create user failed");
            ApiError::from(e)
        })?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Read, apply, write back. Not transactional: an update landing between the
/// read and the write is overwritten.
pub async fn update_user(
    store: &dyn UserStore,
    id: Uuid,
    patch: UpdateUserRequest,
) -> ApiResult<User> {
    let mut user = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    if patch.is_empty() {
        return Ok(user);
    }
    if let Some(name) = patch.name {
        user.name = name;
    }
    if let Some(email) = patch.email {
        user.email = email;
    }
    if let Some(password) = patch.password {
        user.password_hash = hash(&password)?;
    }

    let updated = store
        .update(user)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!(user_id = %updated.id, "user updated");
    Ok(updated)
}

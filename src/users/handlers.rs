use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        MessageResponse, PublicUser, RegisterRequest, SignupResponse, UpdateUserRequest,
        UserEnvelope,
    },
    repo_types::{Gender, UserFilter},
    services::{register_user, update_user},
};
use crate::{
    auth::{extractors::AuthUser, jwt::JwtKeys},
    error::{ApiError, ApiResult},
    extract::{AppJson, ValidatedJson},
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/users/signup", post(signup))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/male", get(list_male_users))
        .route(
            "/users/:id",
            get(get_user).patch(patch_user).delete(delete_user),
        )
}

/// Ids are opaque to clients; anything that does not parse names no user.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("user not found".into()))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let user = register_user(state.users.as_ref(), payload).await?;

    let keys = JwtKeys::from_ref(&state);
    let access = keys.sign_access(user.id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::internal(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user.id,
            token: access.token,
        }),
    ))
}

#[instrument(skip(state, auth), fields(caller = %auth.user_id))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = state.users.list(UserFilter::default()).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, auth), fields(caller = %auth.user_id))]
pub async fn list_male_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let filter = UserFilter {
        gender: Some(Gender::Male),
    };
    let users = state.users.list(filter).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, auth), fields(caller = %auth.user_id))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserEnvelope>> {
    let id = parse_id(&id)?;
    let user = state
        .users
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, auth, body), fields(caller = %auth.user_id))]
pub async fn patch_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<serde_json::Value>,
) -> ApiResult<Json<PublicUser>> {
    let id = parse_id(&id)?;
    let patch = UpdateUserRequest::from_body(body)?;
    let user = update_user(state.users.as_ref(), id, patch).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, auth), fields(caller = %auth.user_id))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound("user not found".into()));
    }
    info!(user_id = %id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User has been deleted".into(),
    }))
}

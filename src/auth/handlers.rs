use axum::{
    extract::{FromRef, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    claims::TokenKind,
    dto::{LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse},
    extractors::AuthUser,
    jwt::{expiry_of, JwtKeys, SignedToken},
    password::verify_password,
};
use crate::{
    error::{ApiError, ApiResult},
    extract::{AppJson, OptionalJson, ValidatedJson},
    state::AppState,
    users::dto::MessageResponse,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/token", post(refresh))
}

fn bearer_header(access: &SignedToken) -> ApiResult<HeaderMap> {
    let value = HeaderValue::from_str(&format!("Bearer {}", access.token))
        .map_err(ApiError::internal)?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn sign_failed(e: anyhow::Error) -> ApiError {
    error!(error = %e, "jwt sign failed");
    ApiError::internal(e)
}

fn bad_credentials() -> ApiError {
    ApiError::Unauthorized("Incorrect email or password".into())
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<LoginResponse>)> {
    let user = match state.users.get_by_email(&payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(bad_credentials());
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        ApiError::internal(e)
    })?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(bad_credentials());
    }

    let keys = JwtKeys::from_ref(&state);
    let access = keys.sign_access(user.id).map_err(sign_failed)?;
    let refresh = keys.sign_refresh(user.id).map_err(sign_failed)?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        bearer_header(&access)?,
        Json(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
        }),
    ))
}

/// Revokes the presented access token and, when the body names one, the
/// refresh token of the same user.
#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    OptionalJson(body): OptionalJson<LogoutRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let body = body.unwrap_or_default();

    let refresh = match body.refresh_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            let keys = JwtKeys::from_ref(&state);
            let claims = keys.verify_refresh(token).map_err(|e| {
                warn!(error = %e, "logout with invalid refresh token");
                ApiError::Unauthorized("Invalid or expired refresh token".into())
            })?;
            if claims.sub != auth.user_id {
                warn!("logout with another user's refresh token");
                return Err(ApiError::Unauthorized("Invalid or expired refresh token".into()));
            }
            Some((token.to_string(), expiry_of(&claims)))
        }
        _ => None,
    };

    state
        .ledger
        .revoke(&auth.token, TokenKind::Access, auth.user_id, auth.expires_at)
        .await?;
    if let Some((token, expires_at)) = refresh {
        state
            .ledger
            .revoke(&token, TokenKind::Refresh, auth.user_id, expires_at)
            .await?;
    }

    info!("user logged out");
    Ok(Json(MessageResponse {
        message: "User logged out successfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> ApiResult<(HeaderMap, Json<RefreshResponse>)> {
    let token = payload
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::field("token", "refresh token is required"))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(token).map_err(|e| {
        warn!(error = %e, "invalid refresh token");
        ApiError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    if state.ledger.is_revoked(token).await? {
        warn!(user_id = %claims.sub, "revoked refresh token presented");
        return Err(ApiError::Unauthorized("Token has been revoked".into()));
    }

    if state.users.get_by_id(claims.sub).await?.is_none() {
        warn!(user_id = %claims.sub, "refresh for deleted user");
        return Err(ApiError::Unauthorized("User no longer exists".into()));
    }

    let access = keys.sign_access(claims.sub).map_err(sign_failed)?;
    info!(user_id = %claims.sub, "access token refreshed");
    Ok((
        bearer_header(&access)?,
        Json(RefreshResponse {
            access_token: access.token,
        }),
    ))
}

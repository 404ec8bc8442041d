use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use super::jwt::{expiry_of, JwtKeys};
use crate::{error::ApiError, state::AppState};

/// Identity of an admitted request.
///
/// Extraction walks: no bearer token → 401; bad signature, wrong issuer or
/// audience, expired, or not an access token → 401; token in the revocation
/// ledger → 401; subject no longer stored → 401; otherwise admitted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Returns the token from `Authorization: Bearer <token>`. Other schemes and
/// bare tokens count as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let revoked = state.ledger.is_revoked(token).await.map_err(|e| {
            error!(error = %e, "ledger lookup failed");
            ApiError::internal(e)
        })?;
        if revoked {
            warn!(user_id = %claims.sub, "revoked token presented");
            return Err(ApiError::Unauthorized("Token has been revoked".into()));
        }

        if state.users.get_by_id(claims.sub).await?.is_none() {
            warn!(user_id = %claims.sub, "token for deleted user");
            return Err(ApiError::Unauthorized("User no longer exists".into()));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            token: token.to_string(),
            expires_at: expiry_of(&claims),
        })
    }
}

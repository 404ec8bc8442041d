use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::Normalize;

/// Request body for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter an email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter a password"))]
    pub password: String,
}

impl Normalize for LoginRequest {
    fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }
}

/// Request body for token refresh: the refresh token travels in the body.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Optional logout body; a refresh token given here is revoked too.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response returned after login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response returned after refresh.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

use std::{borrow::Cow, collections::BTreeMap};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::repo_types::{Gender, User};
use crate::{error::ApiError, extract::Normalize};

/// Only these keys may appear in a PATCH body.
pub const UPDATABLE_FIELDS: [&str; 3] = ["name", "email", "password"];

/// Request body for sign-up. Missing fields default to empty so they surface
/// as per-field validation messages rather than a parse error.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter a name"))]
    pub name: String,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "Please enter an email address"),
        email(message = "Please enter a valid email address")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Please enter at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "validate_gender"))]
    pub gender: Option<String>,
}

impl RegisterRequest {
    /// Absent gender means `Male`.
    pub fn gender(&self) -> Gender {
        self.gender
            .as_deref()
            .and_then(Gender::parse)
            .unwrap_or_default()
    }
}

fn validate_gender(value: &str) -> Result<(), ValidationError> {
    if Gender::parse(value).is_none() {
        return Err(ValidationError::new("gender")
            .with_message(Cow::Borrowed("Gender must be either Male or Female")));
    }
    Ok(())
}

impl Normalize for RegisterRequest {
    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.password = self.password.trim().to_string();
    }
}

/// Partial update. Built through `from_body` so that unknown keys are rejected
/// with a field-level message.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "Please enter a name"))]
    pub name: Option<String>,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Please enter at least 6 characters"))]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn from_body(body: serde_json::Value) -> Result<Self, ApiError> {
        let serde_json::Value::Object(map) = body else {
            return Err(ApiError::BadRequest("expected a JSON object".into()));
        };

        let rejected: BTreeMap<String, String> = map
            .keys()
            .filter(|k| !UPDATABLE_FIELDS.contains(&k.as_str()))
            .map(|k| (k.clone(), format!("{k} cannot be updated")))
            .collect();
        if !rejected.is_empty() {
            return Err(ApiError::Validation(rejected));
        }

        let mut req: UpdateUserRequest = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        req.normalize();
        req.validate()?;
        Ok(req)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

impl Normalize for UpdateUserRequest {
    fn normalize(&mut self) {
        if let Some(name) = self.name.as_mut() {
            *name = name.trim().to_string();
        }
        if let Some(email) = self.email.as_mut() {
            *email = email.trim().to_lowercase();
        }
        if let Some(password) = self.password.as_mut() {
            *password = password.trim().to_string();
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            gender: u.gender,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

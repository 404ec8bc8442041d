use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// User record as held by the store. Not `Serialize`; clients see `PublicUser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Gender,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for a user the store has not assigned an id to yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Gender,
}

impl NewUser {
    pub(crate) fn into_user(self, id: Uuid) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            gender: self.gender,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub gender: Option<Gender>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.gender.map_or(true, |g| user.gender == g)
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A stored account. `password_hash` is a bcrypt string and `version` is the
/// optimistic-concurrency counter bumped by every successful update.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// Fields required to insert a user. The password is already hashed.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public projection returned by the API.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub activated: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            created_at: user.created_at,
            name: user.name.clone(),
            email: user.email.clone(),
            activated: user.activated,
        }
    }
}

/// Lowercase and trim an email for storage and lookups.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Bob@Example.COM "), "bob@example.com");
    }

    #[test]
    fn response_hides_hash_and_version() -> serde_json::Result<()> {
        let user = User {
            id: 1,
            created_at: Utc::now(),
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            activated: false,
            version: 3,
        };
        let value = serde_json::to_value(UserResponse::from(&user))?;
        let object = value.as_object().map(|o| {
            let mut keys: Vec<_> = o.keys().cloned().collect();
            keys.sort();
            keys
        });
        assert_eq!(
            object,
            Some(vec![
                "activated".to_string(),
                "created_at".to_string(),
                "email".to_string(),
                "id".to_string(),
                "name".to_string(),
            ])
        );
        Ok(())
    }
}

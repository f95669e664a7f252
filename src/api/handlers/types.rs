use crate::users::UserResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for RegisterUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterUserRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ActivateUserRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(ToSchema, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAuthenticationTokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for CreateAuthenticationTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateAuthenticationTokenRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(ToSchema, Serialize)]
pub struct AuthenticationToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for AuthenticationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationToken")
            .field("token", &"***")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AuthenticationTokenEnvelope {
    pub authentication_token: AuthenticationToken,
}

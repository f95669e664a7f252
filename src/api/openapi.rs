use super::{
    errors::ErrorBody,
    handlers::{
        health::{self, Health, SystemInfo},
        metrics::{self, PoolStats, Vars},
        tokens,
        types::{
            ActivateUserRequest, AuthenticationToken, AuthenticationTokenEnvelope,
            CreateAuthenticationTokenRequest, RegisterUserRequest, UserEnvelope,
        },
        users,
    },
};
use crate::users::UserResponse;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        metrics::vars,
        users::register,
        users::activate,
        users::me,
        tokens::create_authentication_token,
    ),
    components(schemas(
        Health,
        SystemInfo,
        Vars,
        PoolStats,
        ErrorBody,
        RegisterUserRequest,
        ActivateUserRequest,
        CreateAuthenticationTokenRequest,
        UserResponse,
        UserEnvelope,
        AuthenticationToken,
        AuthenticationTokenEnvelope,
    )),
    modifiers(&BearerToken),
    tags(
        (name = "health", description = "Liveness, build information and runtime metrics"),
        (name = "users", description = "Registration and activation"),
        (name = "tokens", description = "Authentication token issuance"),
    )
)]
struct ApiDoc;

struct BearerToken;

impl Modify for BearerToken {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

use super::{
    accounts::Accounts,
    types::{ActivateUserRequest, RegisterUserRequest, UserEnvelope},
};
use crate::{
    api::{
        errors::{ApiError, ErrorBody},
        middleware::Identity,
    },
    users::UserResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use secrecy::SecretString;

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 202, description = "User created, activation email queued", body = UserEnvelope),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn register(
    Extension(accounts): Extension<Accounts>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let password = SecretString::from(request.password);

    let user = accounts
        .register(&request.name, &request.email, &password)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UserEnvelope {
            user: UserResponse::from(&user),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/v1/users/activated",
    request_body = ActivateUserRequest,
    responses(
        (status = 200, description = "User activated", body = UserEnvelope),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 409, description = "Concurrent update, retry", body = ErrorBody),
        (status = 422, description = "Invalid or expired token", body = ErrorBody),
    ),
    tag = "users"
)]
pub async fn activate(
    Extension(accounts): Extension<Accounts>,
    payload: Result<Json<ActivateUserRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let Json(request) = payload?;
    let user = accounts.activate(&request.token).await?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(&user),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "The authenticated user", body = UserEnvelope),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Account not activated", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn me(Extension(identity): Extension<Identity>) -> Result<Json<UserEnvelope>, ApiError> {
    let user = identity.user().ok_or(ApiError::AuthenticationRequired)?;

    Ok(Json(UserEnvelope {
        user: UserResponse::from(user),
    }))
}

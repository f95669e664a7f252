use super::{
    accounts::Accounts,
    types::{AuthenticationToken, AuthenticationTokenEnvelope, CreateAuthenticationTokenRequest},
};
use crate::api::errors::{ApiError, ErrorBody};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use secrecy::SecretString;

#[utoipa::path(
    post,
    path = "/v1/tokens/authentication",
    request_body = CreateAuthenticationTokenRequest,
    responses(
        (status = 201, description = "Authentication token issued", body = AuthenticationTokenEnvelope),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
    ),
    tag = "tokens"
)]
pub async fn create_authentication_token(
    Extension(accounts): Extension<Accounts>,
    payload: Result<Json<CreateAuthenticationTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let password = SecretString::from(request.password);

    let issued = accounts
        .create_authentication_token(&request.email, &password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthenticationTokenEnvelope {
            authentication_token: AuthenticationToken {
                token: issued.plaintext,
                expiry: issued.token.expiry,
            },
        }),
    ))
}

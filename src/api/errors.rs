//! The single place where failures become HTTP responses.
//!
//! Every error body is `{"error": ...}`: a message string, or a field map for
//! validation failures. Internal errors are logged and replaced by a generic
//! message before they leave the process.

use super::handlers::validator::FieldErrors;
use crate::store::StoreError;
use axum::{
    body::Body,
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

pub const INTERNAL_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,
    #[error("invalid authentication header")]
    InvalidAuthenticationHeader,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("failed validation")]
    Validation(FieldErrors),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("the server encountered a problem and could not process your request")]
    Internal(anyhow::Error),
}

/// Error envelope as documented in the API schema.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// A message, or an object mapping field names to messages.
    #[schema(value_type = Object)]
    pub error: Value,
}

impl ApiError {
    #[must_use]
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::InvalidAuthenticationToken
            | Self::InvalidAuthenticationHeader
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::InactiveAccount => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({ "error": errors }),
            Self::Internal(err) => {
                error!("request failed: {err:#}");
                json!({ "error": INTERNAL_ERROR_MESSAGE })
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(
            self,
            Self::InvalidAuthenticationToken | Self::InvalidAuthenticationHeader
        ) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            other => Self::internal(other),
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Replace axum's empty 405 with the JSON envelope.
pub async fn method_not_allowed(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        let allow = response.headers().get(header::ALLOW).cloned();
        let mut replaced = ApiError::MethodNotAllowed(method).into_response();
        if let Some(allow) = allow {
            replaced.headers_mut().insert(header::ALLOW, allow);
        }
        return replaced;
    }
    response
}

/// Response for a panic caught by `CatchPanicLayer`.
#[must_use]
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic_message(panic.as_ref());
    error!("panic while handling request: {detail}");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else {
        "unknown panic"
    }
}

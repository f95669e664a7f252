use crate::{
    api::{errors::ApiError, handlers::accounts::Accounts},
    store::StoreError,
    tokens::Scope,
    users::User,
};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Who is making the request. Inserted into request extensions by [`authenticate`].
#[derive(Clone, Debug)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }
}

/// Pull the plaintext out of `Authorization: Bearer <token>`.
/// `Ok(None)` means no header at all.
///
/// # Errors
/// `InvalidAuthenticationHeader` when the header exists but is not a bearer credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(Some(token)),
        _ => Err(ApiError::InvalidAuthenticationHeader),
    }
}

fn vary_on_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Resolve the bearer token into an [`Identity`] for downstream handlers.
pub async fn authenticate(
    State(accounts): State<Accounts>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let presented = match bearer_token(request.headers()) {
        Ok(token) => token.map(str::to_owned),
        Err(err) => return vary_on_authorization(err.into_response()),
    };

    let identity = match presented {
        None => Identity::Anonymous,
        Some(token) => match accounts
            .credentials()
            .get_for_token(Scope::Authentication, &token)
            .await
        {
            Ok(user) => Identity::User(user),
            Err(StoreError::NotFound) => {
                return vary_on_authorization(ApiError::InvalidAuthenticationToken.into_response())
            }
            Err(err) => return vary_on_authorization(ApiError::from(err).into_response()),
        },
    };

    request.extensions_mut().insert(identity);
    vary_on_authorization(next.run(request).await)
}

/// Gate for routes that need an activated account.
pub async fn require_activated_user(request: Request<Body>, next: Next) -> Response {
    let activated = request
        .extensions()
        .get::<Identity>()
        .and_then(Identity::user)
        .map(|user| user.activated);

    match activated {
        None => ApiError::AuthenticationRequired.into_response(),
        Some(false) => ApiError::InactiveAccount.into_response(),
        Some(true) => next.run(request).await,
    }
}

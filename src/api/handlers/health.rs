use crate::GIT_COMMIT_HASH;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Deployment environment reported by the health check.
#[derive(Clone, Debug)]
pub struct Environment(pub String);

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SystemInfo {
    environment: String,
    version: String,
    commit: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Health {
    status: String,
    system_info: SystemInfo,
}

#[utoipa::path(
    get,
    path = "/healthcheck",
    responses(
        (status = 200, description = "Service is available", body = Health),
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(Extension(environment): Extension<Arc<Environment>>) -> impl IntoResponse {
    let health = Health {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: environment.0.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: GIT_COMMIT_HASH.to_string(),
        },
    };

    let short_hash = if health.system_info.commit.len() > 7 {
        &health.system_info.commit[0..7]
    } else {
        ""
    };

    let headers = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        health.system_info.version,
        short_hash
    )
    .parse::<HeaderValue>()
    .map(|x_app_header_value| {
        debug!("X-App header: {:?}", x_app_header_value);

        let mut headers = HeaderMap::new();

        headers.insert("X-App", x_app_header_value);

        headers
    })
    .map_err(|err| {
        error!("Failed to parse X-App header: {}", err);
    });

    // Fall back to no extra headers if the value could not be built
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    (headers, Json(health))
}

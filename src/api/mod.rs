use crate::api::{
    handlers::{
        accounts::Accounts, health, health::Environment, metrics, metrics::DatabasePool, tokens,
        users,
    },
    middleware::{authenticate, rate_limit, require_activated_user, RateLimiter},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension},
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod email;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod openapi;

/// Request bodies above this size are rejected before decoding.
pub const MAX_BODY_BYTES: usize = 1_048_576;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    port: u16,
    environment: String,
    cors_trusted_origins: Vec<String>,
    shutdown_timeout: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: "development".to_string(),
            cors_trusted_origins: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    #[must_use]
    pub fn with_cors_trusted_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_trusted_origins = origins;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn cors_trusted_origins(&self) -> &[String] {
        &self.cors_trusted_origins
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid CORS trusted origin")?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

/// Build the full request pipeline.
///
/// Outermost first: panic recovery, request id and tracing, CORS, rate
/// limiting, authentication, then the routes.
///
/// `pool` only feeds `/debug/vars`; pass `DatabasePool::default()` for
/// in-memory storage.
///
/// # Errors
/// Returns an error if a CORS origin is not a valid header value.
pub fn router(
    accounts: Accounts,
    limiter: Arc<RateLimiter>,
    pool: DatabasePool,
    config: &ServerConfig,
) -> Result<Router> {
    let protected = Router::new()
        .route("/v1/users/me", get(users::me))
        .route_layer(axum_middleware::from_fn(require_activated_user));

    let app = Router::new()
        .route("/healthcheck", get(health::health))
        .route("/debug/vars", get(metrics::vars))
        .route("/v1/users", post(users::register))
        .route("/v1/users/activated", put(users::activate))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .merge(protected)
        .fallback(errors::not_found)
        .layer(axum_middleware::from_fn(errors::method_not_allowed))
        .layer(axum_middleware::from_fn_with_state(
            accounts.clone(),
            authenticate,
        ))
        .layer(axum_middleware::from_fn_with_state(limiter, rate_limit))
        .layer(cors_layer(config.cors_trusted_origins())?)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(Extension(accounts))
        .layer(Extension(pool))
        .layer(Extension(Arc::new(Environment(
            config.environment().to_string(),
        ))))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(errors::handle_panic))
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        );

    Ok(app)
}

/// Serve `app` until SIGINT or SIGTERM, then let in-flight requests finish.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gracefully shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!("http.request", method, path, request_id)
}

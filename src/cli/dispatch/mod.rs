use crate::{
    api::{
        handlers::accounts::AuthConfig, middleware::LimiterConfig, ServerConfig,
        DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT,
    },
    cli::{
        actions::{
            server::{Args, DatabaseArgs, Storage},
            Action,
        },
        commands::{
            auth, database, limiter, ARG_CORS_TRUSTED_ORIGINS, ARG_ENV, ARG_PORT,
            ARG_SHUTDOWN_TIMEOUT,
        },
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let server = ServerConfig::new()
        .with_port(
            matches
                .get_one::<u16>(ARG_PORT)
                .copied()
                .unwrap_or(DEFAULT_PORT),
        )
        .with_environment(
            matches
                .get_one::<String>(ARG_ENV)
                .cloned()
                .unwrap_or_else(|| "development".to_string()),
        )
        .with_cors_trusted_origins(
            matches
                .get_one::<String>(ARG_CORS_TRUSTED_ORIGINS)
                .map(|origins| origins.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        )
        .with_shutdown_timeout(
            matches
                .get_one::<u64>(ARG_SHUTDOWN_TIMEOUT)
                .map_or(DEFAULT_SHUTDOWN_TIMEOUT, |secs| Duration::from_secs(*secs)),
        );

    let storage = match matches
        .get_one::<String>(database::ARG_STORAGE)
        .map(String::as_str)
    {
        Some("memory") => Storage::Memory,
        _ => Storage::Postgres(DatabaseArgs {
            dsn: matches
                .get_one::<String>(database::ARG_DSN)
                .map(|dsn| SecretString::from(dsn.as_str()))
                .context("missing required argument: --dsn")?,
            max_open_conns: matches
                .get_one::<u32>(database::ARG_DB_MAX_OPEN_CONNS)
                .copied()
                .unwrap_or(25),
            max_idle_time: Duration::from_secs(
                matches
                    .get_one::<u64>(database::ARG_DB_MAX_IDLE_TIME)
                    .copied()
                    .unwrap_or(900),
            ),
            query_timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(database::ARG_DB_QUERY_TIMEOUT)
                    .copied()
                    .unwrap_or(3),
            ),
        }),
    };

    let mut limiter_config = LimiterConfig::new();
    if let Some(rps) = matches.get_one::<f64>(limiter::ARG_LIMITER_RPS) {
        limiter_config = limiter_config.with_rps(*rps);
    }
    if let Some(burst) = matches.get_one::<u32>(limiter::ARG_LIMITER_BURST) {
        limiter_config = limiter_config.with_burst(*burst);
    }
    if let Some(enabled) = matches.get_one::<bool>(limiter::ARG_LIMITER_ENABLED) {
        limiter_config = limiter_config.with_enabled(*enabled);
    }

    let mut auth_config = AuthConfig::new();
    if let Some(ttl) = matches.get_one::<i64>(auth::ARG_ACTIVATION_TOKEN_TTL) {
        auth_config = auth_config.with_activation_token_ttl_seconds(*ttl);
    }
    if let Some(ttl) = matches.get_one::<i64>(auth::ARG_AUTHENTICATION_TOKEN_TTL) {
        auth_config = auth_config.with_authentication_token_ttl_seconds(*ttl);
    }

    Ok(Action::Server(Args {
        server,
        storage,
        limiter: limiter_config,
        auth: auth_config,
    }))
}

pub mod auth;
pub mod database;
pub mod limiter;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_ENV: &str = "env";
pub const ARG_CORS_TRUSTED_ORIGINS: &str = "cors-trusted-origins";
pub const ARG_SHUTDOWN_TIMEOUT: &str = "shutdown-timeout";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("relohelper")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("API server port")
                .default_value("4000")
                .env("RELOHELPER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ENV)
                .long(ARG_ENV)
                .help("Environment")
                .default_value("development")
                .env("RELOHELPER_ENV")
                .value_parser(["development", "staging", "production"]),
        )
        .arg(
            Arg::new(ARG_CORS_TRUSTED_ORIGINS)
                .long(ARG_CORS_TRUSTED_ORIGINS)
                .help("Trusted CORS origins (space separated)")
                .env("RELOHELPER_CORS_TRUSTED_ORIGINS"),
        )
        .arg(
            Arg::new(ARG_SHUTDOWN_TIMEOUT)
                .long(ARG_SHUTDOWN_TIMEOUT)
                .help("Seconds to wait for background work on shutdown")
                .default_value("30")
                .env("RELOHELPER_SHUTDOWN_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        );

    let command = database::with_args(command);
    let command = limiter::with_args(command);
    let command = auth::with_args(command);
    logging::with_args(command)
}

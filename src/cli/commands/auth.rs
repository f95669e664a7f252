use clap::{Arg, Command};

pub const ARG_ACTIVATION_TOKEN_TTL: &str = "activation-token-ttl";
pub const ARG_AUTHENTICATION_TOKEN_TTL: &str = "authentication-token-ttl";

// One year, in seconds.
const MAX_TTL_SECONDS: i64 = 31_536_000;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACTIVATION_TOKEN_TTL)
                .long(ARG_ACTIVATION_TOKEN_TTL)
                .help("Activation token lifetime in seconds")
                .env("RELOHELPER_ACTIVATION_TOKEN_TTL")
                .default_value("259200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_AUTHENTICATION_TOKEN_TTL)
                .long(ARG_AUTHENTICATION_TOKEN_TTL)
                .help("Authentication token lifetime in seconds")
                .env("RELOHELPER_AUTHENTICATION_TOKEN_TTL")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
}

use clap::{Arg, Command};

pub const ARG_STORAGE: &str = "storage";
pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_MAX_OPEN_CONNS: &str = "db-max-open-conns";
pub const ARG_DB_MAX_IDLE_TIME: &str = "db-max-idle-time";
pub const ARG_DB_QUERY_TIMEOUT: &str = "db-query-timeout";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STORAGE)
                .long(ARG_STORAGE)
                .help("Where users and tokens are kept")
                .long_help(
                    "Where users and tokens are kept. `memory` keeps everything in the process and loses it on restart; use it for local development only.",
                )
                .env("RELOHELPER_STORAGE")
                .default_value("postgres")
                .value_parser(["postgres", "memory"]),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("PostgreSQL connection string")
                .env("RELOHELPER_DB_DSN")
                .required_if_eq(ARG_STORAGE, "postgres"),
        )
        .arg(
            Arg::new(ARG_DB_MAX_OPEN_CONNS)
                .long(ARG_DB_MAX_OPEN_CONNS)
                .help("Maximum open connections in the pool")
                .env("RELOHELPER_DB_MAX_OPEN_CONNS")
                .default_value("25")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_DB_MAX_IDLE_TIME)
                .long(ARG_DB_MAX_IDLE_TIME)
                .help("Seconds an idle connection is kept before closing")
                .env("RELOHELPER_DB_MAX_IDLE_TIME")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_DB_QUERY_TIMEOUT)
                .long(ARG_DB_QUERY_TIMEOUT)
                .help("Seconds before a single query is abandoned")
                .env("RELOHELPER_DB_QUERY_TIMEOUT")
                .default_value("3")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

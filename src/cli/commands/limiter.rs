use clap::{Arg, ArgAction, Command};

pub const ARG_LIMITER_RPS: &str = "limiter-rps";
pub const ARG_LIMITER_BURST: &str = "limiter-burst";
pub const ARG_LIMITER_ENABLED: &str = "limiter-enabled";

fn positive_f64(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if parsed.is_finite() && parsed > 0.0 {
        Ok(parsed)
    } else {
        Err("must be greater than zero".to_string())
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LIMITER_RPS)
                .long(ARG_LIMITER_RPS)
                .help("Rate limiter maximum requests per second")
                .env("RELOHELPER_LIMITER_RPS")
                .default_value("10")
                .value_parser(positive_f64),
        )
        .arg(
            Arg::new(ARG_LIMITER_BURST)
                .long(ARG_LIMITER_BURST)
                .help("Rate limiter maximum burst")
                .env("RELOHELPER_LIMITER_BURST")
                .default_value("20")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LIMITER_ENABLED)
                .long(ARG_LIMITER_ENABLED)
                .help("Enable rate limiter")
                .env("RELOHELPER_LIMITER_ENABLED")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
}

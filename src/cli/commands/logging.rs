use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

// Index is the verbosity count the name stands for.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim().to_lowercase();
    if let Ok(count) = level.parse::<u8>() {
        if usize::from(count) < LEVELS.len() {
            return Ok(count);
        }
    }
    let level = if level == "warning" { "warn" } else { level.as_str() };
    LEVELS
        .iter()
        .position(|name| *name == level)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level, expected one of: {}", LEVELS.join(", ")))
}

/// `RELOHELPER_LOG_LEVEL=debug` and `RELOHELPER_LOG_LEVEL=3` are equivalent to `-vvv`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("RELOHELPER_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_counts() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level("WARNING"), Ok(1));
        assert_eq!(parse_level(" Info "), Ok(2));
        assert_eq!(parse_level("3"), Ok(3));
        assert_eq!(parse_level("trace"), Ok(4));
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("9").is_err());
        assert!(parse_level("").is_err());
    }
}

//! Tracing setup and log-field masking.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::AppError;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::ConfigError(format!("invalid log level {:?}: {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    result.map_err(|e| AppError::InternalError(format!("logging already initialised: {}", e)))
}

/// Hides the middle of `value`. A pattern of one to three `*` keeps that many
/// characters at each end; any other pattern replaces the value outright.
///
/// ```
/// use authgate_server::logging::mask;
///
/// assert_eq!(mask("ann@example.com", "**"), "an***********om");
/// assert_eq!(mask("abc", "*"), "a*c");
/// ```
pub fn mask(value: &str, pattern: &str) -> String {
    let keep = match pattern {
        "*" => 1,
        "**" => 2,
        "***" => 3,
        other => return other.to_string(),
    };

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= keep * 2 {
        return "*".repeat(keep.max(2));
    }

    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - keep * 2), tail)
}

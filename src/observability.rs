//! Tracing subscriber initialisation.

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingConfig};

type FmtLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while initialising observability.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Failed to initialise tracing subscriber.
    #[error("failed to initialise tracing subscriber: {0}")]
    TracingSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber built by [`build_subscriber`].
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    build_subscriber(config).try_init()?;

    Ok(())
}

/// An `EnvFilter` from `RUST_LOG` (or the configured level) over a compact or
/// JSON formatter. Nothing is installed; scope it with
/// `tracing::subscriber::set_default` or install it with [`init_subscriber`].
#[must_use]
pub fn build_subscriber(config: &LoggingConfig) -> impl Subscriber + Send + Sync + 'static {
    let fmt_layer: FmtLayer = match config.log_format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_env_filter(config))
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.log_level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_subscriber_only_applies_inside_its_scope() {
        let config = LoggingConfig {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        };

        {
            let _guard = tracing::subscriber::set_default(build_subscriber(&config));

            assert!(!tracing::error_span!("observability.scoped").is_disabled());
        }

        // No global subscriber was installed, so the no-op dispatcher is back.
        assert!(tracing::error_span!("observability.scoped").is_disabled());
    }
}

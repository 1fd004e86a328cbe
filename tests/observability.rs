//! Global subscriber installation. Kept in its own test binary so the
//! installed subscriber can't write into other tests' output.

use promo_engine::{
    config::{LogFormat, LoggingConfig},
    observability::{ObservabilityError, init_subscriber},
};
use testresult::TestResult;

#[test]
fn second_initialisation_fails() -> TestResult {
    let config = LoggingConfig {
        log_level: "warn".to_string(),
        log_format: LogFormat::Compact,
    };

    init_subscriber(&config)?;

    let second = init_subscriber(&config);

    assert!(matches!(second, Err(ObservabilityError::TracingSubscriber(_))));

    Ok(())
}

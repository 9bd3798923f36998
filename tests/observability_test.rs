//! Global subscriber installation runs in its own test binary so no other
//! test can own the global dispatcher first.

use landmark_explorer::config::LoggingConfig;
use landmark_explorer::observability::init_logging;

#[test]
fn test_second_init_fails_instead_of_panicking() {
    let config = LoggingConfig::default();

    assert!(init_logging(&config).is_ok());
    tracing::info!("global subscriber installed");

    let second = init_logging(&config);
    assert!(second.is_err());
    assert!(format!("{:#}", second.unwrap_err()).contains("already installed"));
}

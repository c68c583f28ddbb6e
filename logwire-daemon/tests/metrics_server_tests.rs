//! Integration tests for metrics server functionality.

use logwire_core::config::MetricsConfig;
use logwire_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    // Given: An invalid metrics configuration (invalid IP)
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9100,
    };

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should fail before anything is installed
    assert!(
        result.is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_hostname() {
    // Given: A hostname instead of an IP literal
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "localhost".to_owned(),
        port: 9100,
    };

    // When/Then: The address does not parse as a socket address
    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}

//! logwire.toml 통합 설정 테스트
//!
//! - logwire.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 / 잘못된 형식 에러 테스트

use std::io::Write;

use logwire_core::config::LogwireConfig;
use logwire_core::error::{ConfigError, LogwireError};

const EXAMPLE: &str = include_str!("../../../logwire.toml.example");

/// 환경변수를 설정한 채로 `f`를 실행하고 원래 값으로 복원합니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: serial_test로 직렬화된 테스트에서만 호출됩니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// logwire.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = LogwireConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = LogwireConfig::parse(EXAMPLE).expect("should parse");
    let from_code = LogwireConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);

    assert_eq!(from_file.input.format, from_code.input.format);
    assert_eq!(from_file.input.tcp_bind, from_code.input.tcp_bind);
    assert_eq!(from_file.input.udp_bind, from_code.input.udp_bind);
    assert_eq!(
        from_file.input.max_message_size,
        from_code.input.max_message_size
    );
    assert_eq!(
        from_file.input.max_connections,
        from_code.input.max_connections
    );
    assert_eq!(
        from_file.input.connection_timeout_secs,
        from_code.input.connection_timeout_secs
    );
    assert_eq!(
        from_file.input.intake_capacity,
        from_code.input.intake_capacity
    );

    assert_eq!(from_file.batch.size, from_code.batch.size);
    assert_eq!(
        from_file.batch.flush_interval_secs,
        from_code.batch.flush_interval_secs
    );
    assert_eq!(from_file.batch.queue_capacity, from_code.batch.queue_capacity);

    assert_eq!(from_file.dispatch.enabled, from_code.dispatch.enabled);
    assert_eq!(from_file.dispatch.config_path, from_code.dispatch.config_path);
    assert_eq!(
        from_file.dispatch.publish_timeout_secs,
        from_code.dispatch.publish_timeout_secs
    );
    assert_eq!(
        from_file.dispatch.connect_timeout_secs,
        from_code.dispatch.connect_timeout_secs
    );

    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.listen_addr, from_code.metrics.listen_addr);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_input_only() {
    let toml = r#"
[input]
format = "syslog"
udp_bind = ""
"#;
    let config = LogwireConfig::parse(toml).expect("should parse");
    config.validate().expect("tcp listener alone is enough");
    assert_eq!(config.input.format, "syslog");
    assert!(config.input.udp_bind.is_empty());
    assert_eq!(config.batch.size, 100);
}

#[test]
fn partial_config_dispatch_and_metrics() {
    let toml = r#"
[dispatch]
enabled = true
config_path = "/srv/logwire/nap.json"

[metrics]
enabled = true
port = 9400
"#;
    let config = LogwireConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");
    assert!(config.dispatch.enabled);
    assert_eq!(config.dispatch.config_path, "/srv/logwire/nap.json");
    assert_eq!(config.metrics.port, 9400);
    assert_eq!(config.metrics.listen_addr, "127.0.0.1");
}

#[test]
fn wrong_value_type_is_parse_error() {
    let toml = r#"
[batch]
size = "lots"
"#;
    let err = LogwireConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        LogwireError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[input]
tcp_bind = "0.0.0.0:1514"
"#;
    let result = with_env("LOGWIRE_INPUT_TCP_BIND", "127.0.0.1:6514", || {
        let mut config = LogwireConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.input.tcp_bind
    });
    assert_eq!(result, "127.0.0.1:6514");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let result = with_env("LOGWIRE_BATCH_SIZE", "999", || {
        let mut config = LogwireConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.batch.size
    });
    assert_eq!(result, 999);
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let result = with_env("LOGWIRE_DISPATCH_ENABLED", "true", || {
        let mut config = LogwireConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.dispatch.enabled
    });
    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_file_value() {
    let toml = r#"
[metrics]
port = 9300
"#;
    let result = with_env("LOGWIRE_METRICS_PORT", "not-a-port", || {
        let mut config = LogwireConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.metrics.port
    });
    assert_eq!(result, 9300);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
#[serial_test::serial]
async fn load_reads_file_and_applies_env() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[general]\nlog_level = \"debug\"").expect("write");

    let original = std::env::var("LOGWIRE_GENERAL_LOG_FORMAT").ok();
    // SAFETY: serial_test로 직렬화된 테스트입니다.
    unsafe { std::env::set_var("LOGWIRE_GENERAL_LOG_FORMAT", "pretty") };

    let result = LogwireConfig::load(file.path()).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGWIRE_GENERAL_LOG_FORMAT", val),
            None => std::env::remove_var("LOGWIRE_GENERAL_LOG_FORMAT"),
        }
    }

    let config = result.expect("should load");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
}

#[tokio::test]
#[serial_test::serial]
async fn load_rejects_invalid_env_value_at_validation() {
    let file = tempfile::NamedTempFile::new().expect("tempfile");

    let original = std::env::var("LOGWIRE_BATCH_SIZE").ok();
    // SAFETY: serial_test로 직렬화된 테스트입니다.
    unsafe { std::env::set_var("LOGWIRE_BATCH_SIZE", "0") };

    let result = LogwireConfig::load(file.path()).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGWIRE_BATCH_SIZE", val),
            None => std::env::remove_var("LOGWIRE_BATCH_SIZE"),
        }
    }

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        LogwireError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[general]\nlog_format = \"xml\"").expect("write");

    let err = LogwireConfig::from_file(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("log_format"));
}

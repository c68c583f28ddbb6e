//! 설정 관리 -- logwire.toml 파싱 및 런타임 설정
//!
//! [`LogwireConfig`]는 데몬의 모든 섹션 설정을 담는 최상위 구조체입니다.
//! 디스패처 정의(JSON)는 `logwire-dispatch`가 별도로 로드하며,
//! 여기서는 그 파일 경로만 보관합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWIRE_INPUT_TCP_BIND=0.0.0.0:5514` 형식)
//! 3. 설정 파일 (`logwire.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwire_core::error::LogwireError> {
//! use logwire_core::config::LogwireConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwireConfig::load("logwire.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwireConfig::parse("[input]\nformat = \"rfc3164\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwireError};

/// 메시지 최대 크기 상한 (1MB)
const MAX_MESSAGE_SIZE_LIMIT: usize = 1024 * 1024;

/// logwire 통합 설정
///
/// `logwire.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwireConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 설정
    #[serde(default)]
    pub input: InputConfig,
    /// 배치 설정
    #[serde(default)]
    pub batch: BatchConfig,
    /// 디스패치 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogwireConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwireError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwireError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwireError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwireError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwireError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwireError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWIRE_{SECTION}_{FIELD}`
    /// 예: `LOGWIRE_BATCH_SIZE=500`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWIRE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWIRE_GENERAL_LOG_FORMAT");

        // Input
        override_string(&mut self.input.format, "LOGWIRE_INPUT_FORMAT");
        override_string(&mut self.input.tcp_bind, "LOGWIRE_INPUT_TCP_BIND");
        override_string(&mut self.input.udp_bind, "LOGWIRE_INPUT_UDP_BIND");
        override_usize(
            &mut self.input.max_message_size,
            "LOGWIRE_INPUT_MAX_MESSAGE_SIZE",
        );
        override_usize(
            &mut self.input.max_connections,
            "LOGWIRE_INPUT_MAX_CONNECTIONS",
        );
        override_u64(
            &mut self.input.connection_timeout_secs,
            "LOGWIRE_INPUT_CONNECTION_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.input.intake_capacity,
            "LOGWIRE_INPUT_INTAKE_CAPACITY",
        );

        // Batch
        override_usize(&mut self.batch.size, "LOGWIRE_BATCH_SIZE");
        override_u64(
            &mut self.batch.flush_interval_secs,
            "LOGWIRE_BATCH_FLUSH_INTERVAL_SECS",
        );
        override_usize(
            &mut self.batch.queue_capacity,
            "LOGWIRE_BATCH_QUEUE_CAPACITY",
        );

        // Dispatch
        override_bool(&mut self.dispatch.enabled, "LOGWIRE_DISPATCH_ENABLED");
        override_string(
            &mut self.dispatch.config_path,
            "LOGWIRE_DISPATCH_CONFIG_PATH",
        );
        override_u64(
            &mut self.dispatch.publish_timeout_secs,
            "LOGWIRE_DISPATCH_PUBLISH_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.dispatch.connect_timeout_secs,
            "LOGWIRE_DISPATCH_CONNECT_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGWIRE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOGWIRE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOGWIRE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwireError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // 알 수 없는 input.format은 파서가 기본 형식으로 대체하므로 여기서 거부하지 않음
        if self.input.format.trim().is_empty() {
            return Err(invalid("input.format", "must not be empty".to_owned()));
        }

        if self.input.tcp_bind.is_empty() && self.input.udp_bind.is_empty() {
            return Err(invalid(
                "input.tcp_bind",
                "at least one of tcp_bind or udp_bind must be set".to_owned(),
            ));
        }

        if self.input.max_message_size == 0 || self.input.max_message_size > MAX_MESSAGE_SIZE_LIMIT
        {
            return Err(invalid(
                "input.max_message_size",
                format!("must be between 1 and {MAX_MESSAGE_SIZE_LIMIT}"),
            ));
        }

        if self.input.max_connections == 0 {
            return Err(invalid(
                "input.max_connections",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.input.intake_capacity == 0 {
            return Err(invalid(
                "input.intake_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.batch.size == 0 {
            return Err(invalid("batch.size", "must be greater than 0".to_owned()));
        }

        if self.batch.flush_interval_secs == 0 {
            return Err(invalid(
                "batch.flush_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.batch.queue_capacity == 0 {
            return Err(invalid(
                "batch.queue_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.dispatch.enabled && self.dispatch.config_path.is_empty() {
            return Err(invalid(
                "dispatch.config_path",
                "must be set when dispatch is enabled".to_owned(),
            ));
        }

        if self.dispatch.enabled && self.dispatch.connect_timeout_secs == 0 {
            return Err(invalid(
                "dispatch.connect_timeout_secs",
                "must be greater than 0 when dispatch is enabled".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be greater than 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogwireError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// 입력 형식 이름 (syslog, rfc5424, rfc3164)
    pub format: String,
    /// TCP 수신 주소 (빈 문자열이면 비활성)
    pub tcp_bind: String,
    /// UDP 수신 주소 (빈 문자열이면 비활성)
    pub udp_bind: String,
    /// 프레이밍 버퍼 최대 크기 (바이트)
    pub max_message_size: usize,
    /// 최대 동시 TCP 연결 수
    pub max_connections: usize,
    /// TCP 연결 유휴 타임아웃 (초, 0이면 없음)
    pub connection_timeout_secs: u64,
    /// 수집 -> 배처 채널 용량
    pub intake_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: "rfc3164".to_owned(),
            tcp_bind: "0.0.0.0:5514".to_owned(),
            udp_bind: "0.0.0.0:5514".to_owned(),
            max_message_size: 64 * 1024, // 64KB
            max_connections: 256,
            connection_timeout_secs: 300,
            intake_capacity: 10_000,
        }
    }
}

/// 배치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// 배치 크기 (이벤트 수)
    pub size: usize,
    /// 배치 플러시 간격 (초)
    pub flush_interval_secs: u64,
    /// 소비자별 배치 큐 용량
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 100,
            flush_interval_secs: 5,
            queue_capacity: 64,
        }
    }
}

/// 디스패치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 디스패처 정의 JSON 파일 경로
    pub config_path: String,
    /// 발행 1건당 타임아웃 (초, 0이면 없음)
    pub publish_timeout_secs: u64,
    /// 브로커 연결과 토폴로지 선언 전체에 주어지는 시간 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            config_path: "/etc/logwire/dispatchers.json".to_owned(),
            publish_timeout_secs: 0,
            connect_timeout_secs: 10,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

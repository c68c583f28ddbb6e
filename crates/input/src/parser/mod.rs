//! 로그 파싱 모듈 -- 입력 형식 판별과 방언별 필드 추출
//!
//! [`Parser`]는 설정된 입력 형식에 맞는 매처로 메시지를 파싱하고,
//! 같은 형식의 구분자([`Delimiter`])를 만들어 줍니다.
//!
//! # 지원 형식
//! - RFC 3164 계열 벤더 방언 체인 ([`rfc3164`])
//! - RFC 5424 ([`rfc5424`])
//!
//! # 사용 예시
//! ```ignore
//! use logwire_input::parser::{InputPatterns, Parser};
//!
//! let patterns = Arc::new(InputPatterns::compile()?);
//! let parser = Parser::from_name("rfc3164", patterns, metrics);
//! let fields = parser.parse(b"<34>Jan 12 06:30:00 sw1 : %SYS-5-RESTART: restarted");
//! ```

pub mod rfc3164;
pub mod rfc5424;

pub use rfc3164::{Dialect, Rfc3164Patterns};
pub use rfc5424::Rfc5424Patterns;

use std::sync::Arc;

use bytes::Bytes;
use logwire_core::event::{Event, Fields};
use logwire_core::metrics::{
    INPUT_INVALID_FORMAT_TOTAL, INPUT_PARSED_TOTAL, INPUT_UNPARSED_TOTAL, LABEL_FORMAT,
    MetricsSink,
};
use tracing::{debug, warn};

use crate::delimiter::{Delimiter, DelimiterPatterns};
use crate::error::InputError;

/// syslog PRI 최댓값 (facility 23 * 8 + severity 7)
pub const MAX_SYSLOG_PRI: u64 = 191;

/// 입력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RFC 5424 (기본값)
    Rfc5424,
    /// RFC 3164 계열 벤더 방언
    Rfc3164,
}

impl Format {
    /// 설정 문자열에서 형식을 판별합니다.
    ///
    /// `syslog`와 `rfc5424`는 RFC 5424, `rfc3164`는 RFC 3164입니다.
    /// 알 수 없는 이름은 RFC 5424로 대체하고 카운터를 증가시킵니다.
    pub fn detect(name: &str, metrics: &dyn MetricsSink) -> Self {
        match name.trim().to_lowercase().as_str() {
            "syslog" | "rfc5424" => Self::Rfc5424,
            "rfc3164" => Self::Rfc3164,
            other => {
                metrics.increment(INPUT_INVALID_FORMAT_TOTAL, &[], 1);
                warn!(
                    format = other,
                    fallback = Self::Rfc5424.as_str(),
                    "unknown input format, using default"
                );
                Self::Rfc5424
            }
        }
    }

    /// 형식 이름 (메트릭 레이블로도 사용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfc5424 => "rfc5424",
            Self::Rfc3164 => "rfc3164",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시작 시 한 번 컴파일되어 모든 연결이 공유하는 패턴 묶음
#[derive(Debug)]
pub struct InputPatterns {
    delimiter: DelimiterPatterns,
    rfc3164: Rfc3164Patterns,
    rfc5424: Rfc5424Patterns,
}

impl InputPatterns {
    /// 모든 구분자/방언 패턴을 컴파일합니다.
    pub fn compile() -> Result<Self, InputError> {
        Ok(Self {
            delimiter: DelimiterPatterns::compile()?,
            rfc3164: Rfc3164Patterns::compile()?,
            rfc5424: Rfc5424Patterns::compile()?,
        })
    }

    /// 구분자 패턴
    pub fn delimiter(&self) -> &DelimiterPatterns {
        &self.delimiter
    }
}

/// 형식별 메시지 파서
#[derive(Clone)]
pub struct Parser {
    format: Format,
    patterns: Arc<InputPatterns>,
    metrics: Arc<dyn MetricsSink>,
}

impl Parser {
    /// 지정한 형식의 파서를 생성합니다.
    pub fn new(format: Format, patterns: Arc<InputPatterns>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            format,
            patterns,
            metrics,
        }
    }

    /// 형식 이름으로 파서를 생성합니다. 알 수 없는 이름은 기본 형식을 사용합니다.
    pub fn from_name(
        name: &str,
        patterns: Arc<InputPatterns>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let format = Format::detect(name, metrics.as_ref());
        Self::new(format, patterns, metrics)
    }

    /// 파서 형식
    pub fn format(&self) -> Format {
        self.format
    }

    /// 메시지를 파싱합니다.
    ///
    /// 어떤 매처도 맞지 않으면 `None`을 반환합니다.
    /// 호출마다 parsed/unparsed 카운터 중 정확히 하나가 증가합니다.
    pub fn parse(&self, raw: &[u8]) -> Option<Fields> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches(['\r', '\n']);

        let fields = match self.format {
            Format::Rfc3164 => self.patterns.rfc3164.parse(text).map(|(dialect, fields)| {
                debug!(dialect = dialect.as_str(), "matched rfc3164 dialect");
                fields
            }),
            Format::Rfc5424 => self.patterns.rfc5424.parse(text),
        };

        let labels = [(LABEL_FORMAT, self.format.as_str())];
        if fields.is_some() {
            self.metrics.increment(INPUT_PARSED_TOTAL, &labels, 1);
        } else {
            self.metrics.increment(INPUT_UNPARSED_TOTAL, &labels, 1);
            debug!(
                format = self.format.as_str(),
                len = raw.len(),
                "no matcher accepted message"
            );
        }
        fields
    }

    /// 메시지를 파싱하여 이벤트를 생성합니다. 파싱 실패 시 필드는 비어 있습니다.
    pub fn event(&self, raw: impl Into<Bytes>, source: impl Into<String>) -> Event {
        let raw = raw.into();
        let fields = self.parse(&raw).unwrap_or_default();
        Event::new(raw, fields, source)
    }

    /// 이 형식에 맞는 새 구분자를 생성합니다.
    pub fn delimiter(&self, max_size: usize) -> Delimiter {
        let patterns = self.patterns.delimiter();
        match self.format {
            Format::Rfc3164 => patterns.rfc3164(max_size, Arc::clone(&self.metrics)),
            Format::Rfc5424 => patterns.rfc5424(max_size, Arc::clone(&self.metrics)),
        }
    }

    /// 메트릭 싱크
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// PRI 문자열을 정수로 변환합니다. 변환 실패나 범위 초과는 0으로 처리합니다.
pub(crate) fn parse_priority(pri: &str) -> u64 {
    pri.parse::<u64>()
        .ok()
        .filter(|p| *p <= MAX_SYSLOG_PRI)
        .unwrap_or(0)
}

//! RFC 3164 계열 다중 방언 파서
//!
//! 벤더마다 `<PRI>` 뒤의 헤더 모양이 다르므로 방언별 매처를 고정된 순서로
//! 시도하고, 처음 성공한 매처의 필드 매핑을 사용합니다.
//!
//! | 순서 | 방언 | 예시 |
//! |---|---|---|
//! | 1 | Cisco (호스트) | `<189>Jan 12 06:30:00 core-sw-01 : %LINK-3-UPDOWN: ...` |
//! | 2 | Cisco (토큰) | `<166>Jan 12 06:30:00 10.0.0.1 : %ASA-6-302013: ...` |
//! | 3 | Juniper (호스트 + 토큰) | `<34>Jan 12 06:30:00 mx01 fpc0: sshd[8144]: ...` |
//! | 4 | Juniper (호스트) | `<34>Jan 12 06:30:00 mx01: sshd[8144]: ...` |
//! | 5 | Fortinet key=value | `<189>date=2019-05-10 time=11:37:47 devname=fw01 ...` |
//! | 6 | Nexus 콘솔 | `<189>n9k-01: 2019 Jan  3 14:23:11 UTC: %ETHPORT-5-IF_UP: ...` |
//! | 7 | IOS 콘솔 | `<189>123: r1: *Mar  1 00:01:02.345: %LINK-3-UPDOWN: ...` |
//!
//! 5~7은 1~4가 모두 실패했을 때만 시도합니다.

use logwire_core::event::{
    FIELD_APP, FIELD_IDENTIFIER, FIELD_MESSAGE, FIELD_PRIORITY, FIELD_TIMESTAMP, Fields,
};
use regex::{Captures, Regex};
use serde_json::Value;

use super::parse_priority;
use crate::error::InputError;

const PRI: &str = r"^<(?P<pri>[0-9]{1,3})>";
const TS: &str = r"(?P<ts>[A-Za-z]+\s+\d+(?:\s\d+)?\s\d+:\d+:\d+)";
const CISCO_HOST: &str = r"(?P<id>[[:alnum:]]+(?:-[[:alnum:]]+)*)";
const TOKEN: &str = r"(?P<id>[^ =:]+)";
const CISCO_TAG: &str = r"(?P<app>%\w+-\d+-\w+)";
const APP_TAG: &str = r"(?P<app>\w+\[\d+\]|%\w+-\d+-\w+)";
const MSG: &str = r"(?P<msg>(?s:.*))$";

/// Fortinet 로그에서 추가로 보존하는 키
const FORTINET_EXTRA: [&str; 5] = ["devid", "logid", "subtype", "level", "vd"];

/// 벤더 방언
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Cisco, 호스트명 식별자
    CiscoHost,
    /// Cisco, 불투명 토큰 식별자
    CiscoToken,
    /// Juniper, 호스트 뒤 토큰 식별자
    JuniperToken,
    /// Juniper, 호스트명 식별자
    JuniperHost,
    /// Fortinet key=value
    Fortinet,
    /// Nexus 콘솔 형식
    Nexus,
    /// IOS 콘솔 형식 (시퀀스 번호 포함)
    Ios,
}

impl Dialect {
    /// 방언 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CiscoHost => "cisco-host",
            Self::CiscoToken => "cisco-token",
            Self::JuniperToken => "juniper-token",
            Self::JuniperHost => "juniper-host",
            Self::Fortinet => "fortinet",
            Self::Nexus => "nexus",
            Self::Ios => "ios",
        }
    }

    fn pattern(&self) -> String {
        match self {
            Self::CiscoHost => format!(r"{PRI}{TS}\s{CISCO_HOST}\s:\s{CISCO_TAG}:\s{MSG}"),
            Self::CiscoToken => format!(r"{PRI}{TS}\s{TOKEN}\s:\s{CISCO_TAG}:\s{MSG}"),
            Self::JuniperToken => {
                format!(r"{PRI}{TS}\s(?P<host>[[:alnum:]._-]+)\s{TOKEN}:\s{APP_TAG}:\s{MSG}")
            }
            Self::JuniperHost => {
                format!(r"{PRI}{TS}\s(?P<id>[[:alnum:]._-]+):\s{APP_TAG}:\s{MSG}")
            }
            Self::Fortinet => format!(
                concat!(
                    r"{pri}\s*date=(?P<date>[^\s]+)\s+time=(?P<time>[^\s]+)",
                    r#"\s+devname="?(?P<id>[^"\s]+)"?\s+devid="?(?P<devid>[^"\s]+)"?"#,
                    r#"\s+logid="?(?P<logid>[^"\s]+)"?\s+type="?(?P<app>[^"\s]+)"?"#,
                    r#"\s+subtype="?(?P<subtype>[^"\s]+)"?\s+level="?(?P<level>[^"\s]+)"?"#,
                    r#"\s+vd="?(?P<vd>[^"\s]+)"?\s(?:.*?\s)?logdesc="(?P<msg>[^"]*)"(?s:.*)$"#,
                ),
                pri = PRI
            ),
            Self::Nexus => format!(
                r"{PRI}\s*{TOKEN}:\s(?P<ts>\d{{4}}\s[A-Za-z]+\s+\d{{1,2}}\s\d+:\d+:\d+(?:\.\d+)?\s\w+):\s(?:{CISCO_TAG}:\s)?{MSG}"
            ),
            Self::Ios => format!(
                r"{PRI}\s*\d+:\s{TOKEN}:\s\*?(?P<ts>[A-Za-z]+\s+\d+\s\d+:\d+:\d+(?:\.\d+)?(?:\s\w+)?):\s(?:{CISCO_TAG}:\s)?{MSG}"
            ),
        }
    }

    /// app 태그가 필수인지 여부 (콘솔 형식은 태그 없이도 허용)
    fn requires_app(&self) -> bool {
        !matches!(self, Self::Nexus | Self::Ios)
    }

    /// 캡처 결과를 필드로 변환합니다. 필수 그룹이 비어 있으면 `None`.
    fn extract(&self, caps: &Captures<'_>) -> Option<Fields> {
        let group = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
        };

        let priority = parse_priority(group("pri")?);
        let timestamp = match self {
            Self::Fortinet => format!("{} {}", group("date")?, group("time")?),
            _ => group("ts")?.to_owned(),
        };
        let identifier = group("id")?;
        let app = group("app");
        if self.requires_app() && app.is_none() {
            return None;
        }
        let message = group("msg")?;

        let mut fields = Fields::new();
        fields.insert(FIELD_PRIORITY.to_owned(), Value::from(priority));
        fields.insert(FIELD_TIMESTAMP.to_owned(), Value::from(timestamp));
        fields.insert(FIELD_IDENTIFIER.to_owned(), Value::from(identifier));
        if let Some(app) = app {
            fields.insert(FIELD_APP.to_owned(), Value::from(app));
        }
        fields.insert(FIELD_MESSAGE.to_owned(), Value::from(message));

        if *self == Self::Fortinet {
            for key in FORTINET_EXTRA {
                if let Some(val) = group(key) {
                    fields.insert(key.to_owned(), Value::from(val));
                }
            }
        }

        Some(fields)
    }
}

/// 시도 순서
const CHAIN: [Dialect; 7] = [
    Dialect::CiscoHost,
    Dialect::CiscoToken,
    Dialect::JuniperToken,
    Dialect::JuniperHost,
    Dialect::Fortinet,
    Dialect::Nexus,
    Dialect::Ios,
];

/// 컴파일된 RFC 3164 방언 매처 체인
#[derive(Debug)]
pub struct Rfc3164Patterns {
    matchers: Vec<(Dialect, Regex)>,
}

impl Rfc3164Patterns {
    /// 모든 방언 매처를 컴파일합니다.
    pub fn compile() -> Result<Self, InputError> {
        let matchers = CHAIN
            .iter()
            .map(|dialect| Ok((*dialect, Regex::new(&dialect.pattern())?)))
            .collect::<Result<Vec<_>, InputError>>()?;
        Ok(Self { matchers })
    }

    /// 메시지를 파싱하여 필드와 매칭된 방언을 반환합니다.
    pub fn parse(&self, text: &str) -> Option<(Dialect, Fields)> {
        self.matchers.iter().find_map(|(dialect, regex)| {
            let caps = regex.captures(text)?;
            dialect.extract(&caps).map(|fields| (*dialect, fields))
        })
    }
}

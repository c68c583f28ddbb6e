//! RFC 5424 파서
//!
//! 형식: `<PRI>VERSION SP TIMESTAMP SP HOSTNAME SP APP-NAME SP PROCID SP MSGID SP SD [SP MSG]`
//!
//! 모든 헤더 토큰은 원본 그대로 보존합니다. NILVALUE(`-`)도 치환하지 않습니다.

use logwire_core::event::{
    FIELD_APP, FIELD_IDENTIFIER, FIELD_MESSAGE, FIELD_MESSAGE_ID, FIELD_PID, FIELD_PRIORITY,
    FIELD_TIMESTAMP, FIELD_VERSION, Fields,
};
use regex::Regex;
use serde_json::Value;

use super::parse_priority;
use crate::error::InputError;

/// STRUCTURED-DATA 원문 필드
pub const FIELD_STRUCTURED_DATA: &str = "structured_data";

/// RFC 5424 헤더 매처
#[derive(Debug)]
pub struct Rfc5424Patterns {
    header: Regex,
}

impl Rfc5424Patterns {
    /// 헤더 매처를 컴파일합니다.
    pub fn compile() -> Result<Self, InputError> {
        Ok(Self {
            header: Regex::new(
                r"^<(?P<pri>[0-9]{1,3})>(?P<ver>[0-9]{1,2}) (?P<ts>\S+) (?P<id>\S+) (?P<app>\S+) (?P<pid>\S+) (?P<msgid>\S+)(?: (?P<rest>(?s:.*)))?$",
            )?,
        })
    }

    /// 메시지를 파싱합니다. 헤더가 맞지 않으면 `None`.
    pub fn parse(&self, text: &str) -> Option<Fields> {
        let caps = self.header.captures(text)?;
        let token = |name: &str| caps.name(name).map_or("", |m| m.as_str());

        let version: u64 = token("ver").parse().ok()?;
        let (structured_data, message) = split_sd_and_message(token("rest"));

        let mut fields = Fields::new();
        fields.insert(
            FIELD_PRIORITY.to_owned(),
            Value::from(parse_priority(token("pri"))),
        );
        fields.insert(FIELD_VERSION.to_owned(), Value::from(version));
        fields.insert(FIELD_TIMESTAMP.to_owned(), Value::from(token("ts")));
        fields.insert(FIELD_IDENTIFIER.to_owned(), Value::from(token("id")));
        fields.insert(FIELD_APP.to_owned(), Value::from(token("app")));
        fields.insert(FIELD_PID.to_owned(), Value::from(token("pid")));
        fields.insert(FIELD_MESSAGE_ID.to_owned(), Value::from(token("msgid")));
        if let Some(sd) = structured_data {
            fields.insert(FIELD_STRUCTURED_DATA.to_owned(), Value::from(sd));
        }
        fields.insert(FIELD_MESSAGE.to_owned(), Value::from(message));
        Some(fields)
    }
}

/// STRUCTURED-DATA와 MSG를 분리합니다.
///
/// SD는 NILVALUE(`-`)이거나 하나 이상의 `[...]` 블록입니다.
/// 따옴표 안의 `]`와 이스케이프(`\]`, `\"`)는 블록 종료로 보지 않습니다.
/// SD가 없는 비표준 메시지는 나머지 전체를 MSG로 취급합니다.
fn split_sd_and_message(rest: &str) -> (Option<&str>, &str) {
    if rest == "-" {
        return (Some("-"), "");
    }
    if let Some(msg) = rest.strip_prefix("- ") {
        return (Some("-"), msg);
    }
    if !rest.starts_with('[') {
        return (None, rest);
    }

    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;
    let mut sd_end = None;

    for (idx, ch) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            '[' if !in_quote => depth += 1,
            ']' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    sd_end = Some(idx + 1);
                }
            }
            _ if depth == 0 => break,
            _ => {}
        }
    }

    match sd_end {
        Some(end) => {
            let msg = rest[end..].strip_prefix(' ').unwrap_or(&rest[end..]);
            (Some(&rest[..end]), msg)
        }
        // 닫히지 않은 SD는 전체를 SD로 간주
        None => (Some(rest), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Fields> {
        Rfc5424Patterns::compile().unwrap().parse(text)
    }

    fn field<'a>(fields: &'a Fields, key: &str) -> &'a str {
        fields.get(key).and_then(Value::as_str).unwrap()
    }

    #[test]
    fn parse_basic_with_nil_sd() {
        let fields = parse(
            "<34>1 2003-10-11T22:14:15.003Z mymachine.example.com su - ID47 - 'su root' failed",
        )
        .unwrap();
        assert_eq!(fields[FIELD_PRIORITY], Value::from(34));
        assert_eq!(fields[FIELD_VERSION], Value::from(1));
        assert_eq!(field(&fields, FIELD_TIMESTAMP), "2003-10-11T22:14:15.003Z");
        assert_eq!(field(&fields, FIELD_IDENTIFIER), "mymachine.example.com");
        assert_eq!(field(&fields, FIELD_APP), "su");
        assert_eq!(field(&fields, FIELD_PID), "-");
        assert_eq!(field(&fields, FIELD_MESSAGE_ID), "ID47");
        assert_eq!(field(&fields, FIELD_STRUCTURED_DATA), "-");
        assert_eq!(field(&fields, FIELD_MESSAGE), "'su root' failed");
    }

    #[test]
    fn parse_multiple_sd_elements() {
        let fields = parse(
            r#"<165>1 2003-10-11T22:14:15.003Z host evntslog - ID47 [exampleSDID@32473 iut="3" eventID="1011"][examplePriority@32473 class="high"] An application event"#,
        )
        .unwrap();
        assert_eq!(
            field(&fields, FIELD_STRUCTURED_DATA),
            r#"[exampleSDID@32473 iut="3" eventID="1011"][examplePriority@32473 class="high"]"#
        );
        assert_eq!(field(&fields, FIELD_MESSAGE), "An application event");
    }

    #[test]
    fn sd_with_escaped_bracket_in_quotes() {
        let (sd, msg) = split_sd_and_message(r#"[id k="a\]b"] tail"#);
        assert_eq!(sd, Some(r#"[id k="a\]b"]"#));
        assert_eq!(msg, "tail");
    }

    #[test]
    fn missing_sd_treats_rest_as_message() {
        let fields = parse("<13>1 - host app 42 - plain text body").unwrap();
        assert!(!fields.contains_key(FIELD_STRUCTURED_DATA));
        assert_eq!(field(&fields, FIELD_MESSAGE), "plain text body");
    }

    #[test]
    fn header_only_has_empty_message() {
        let fields = parse("<13>1 - host app - -").unwrap();
        assert_eq!(field(&fields, FIELD_MESSAGE), "");
    }

    #[test]
    fn rfc3164_line_does_not_match() {
        assert!(parse("<34>Jan 12 06:30:00 mymachine su: failed").is_none());
    }
}

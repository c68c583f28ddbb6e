//! nap 규칙 엔진 -- 네트워크 장비 이벤트 탐지 및 발행
//!
//! 이벤트의 `message` 필드를 고정된 규칙 순서로 검사하고, 처음 매칭된 규칙의
//! 트리거로 이벤트를 한 번 발행합니다.
//!
//! # 규칙 (순서대로, 첫 매칭 우선)
//! 1. 설정 저장/커밋 문구 -> `config-updated`
//! 2. `Interface <if> is (up|down)` -> `interface`, `state` 추가 후 `interface-up-down`
//! 3. `Line protocol on Interface <if>, changed state to (up|down)` -> 2와 동일
//!
//! `message`가 없거나 문자열이 아니면 모든 규칙이 매칭되지 않습니다.
//! 배치는 공유되므로 필드 추가는 매칭된 이벤트의 복제본에서만 이루어집니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use logwire_core::event::{Batch, Event};
use logwire_core::metrics::{
    DISPATCH_PUBLISH_FAILURES_TOTAL, DISPATCH_PUBLISHED_TOTAL, DISPATCH_RULE_MATCHES_TOTAL,
    LABEL_TRIGGER, MetricsSink,
};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{TRIGGER_CONFIG_UPDATED, TRIGGER_INTERFACE_UP_DOWN, Trigger};
use crate::error::DispatchError;
use crate::publisher::EventPublisher;

/// 추가 필드: 인터페이스 이름
pub const FIELD_INTERFACE: &str = "interface";

/// 추가 필드: 링크 상태 (up / down)
pub const FIELD_STATE: &str = "state";

/// 대소문자를 구분하는 설정 저장 문구
const CONFIG_PHRASES: &[&str] = &[
    "'write memory' command", // cisco
    "commit complete",        // juniper
];

/// 소문자 비교하는 설정 저장 문구
const CONFIG_PHRASES_CASELESS: &[&str] = &[
    "attribute configured", // fortinet
    "configured from",      // nx-os, ios
];

const INTERFACE_STATE: &str = r"Interface ([\w/]+) is (up|down)";
const LINE_PROTOCOL_STATE: &str = r"Line protocol on Interface ([\w/]+), changed state to (up|down)";

/// 취소 후 큐가 닫히기를 기다리는 최대 시간
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// 규칙 평가 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// 설정 변경
    ConfigUpdated,
    /// 인터페이스 상태 변경
    InterfaceState {
        /// 인터페이스 이름 (예: "Gi0/1")
        interface: String,
        /// "up" 또는 "down"
        state: String,
    },
}

impl RuleMatch {
    /// 발행할 트리거 이름
    pub fn trigger(&self) -> &'static str {
        match self {
            Self::ConfigUpdated => TRIGGER_CONFIG_UPDATED,
            Self::InterfaceState { .. } => TRIGGER_INTERFACE_UP_DOWN,
        }
    }

    /// 매칭 결과를 이벤트 필드에 추가합니다.
    pub fn apply(&self, event: &mut Event) {
        if let Self::InterfaceState { interface, state } = self {
            if !event.augment(FIELD_INTERFACE, interface.as_str()) {
                debug!(field = FIELD_INTERFACE, "field already present, not overwritten");
            }
            if !event.augment(FIELD_STATE, state.as_str()) {
                debug!(field = FIELD_STATE, "field already present, not overwritten");
            }
        }
    }
}

/// 시작 시 한 번 컴파일되는 nap 규칙
#[derive(Debug)]
pub struct NapRules {
    interface_state: Regex,
    line_protocol_state: Regex,
}

impl NapRules {
    /// 규칙 패턴을 컴파일합니다.
    pub fn compile() -> Result<Self, DispatchError> {
        Ok(Self {
            interface_state: Regex::new(INTERFACE_STATE)?,
            line_protocol_state: Regex::new(LINE_PROTOCOL_STATE)?,
        })
    }

    /// 이벤트를 평가합니다. 부수 효과가 없습니다.
    pub fn evaluate(&self, event: &Event) -> Option<RuleMatch> {
        let message = event.message()?;

        if is_config_update(message) {
            return Some(RuleMatch::ConfigUpdated);
        }

        [&self.interface_state, &self.line_protocol_state]
            .into_iter()
            .find_map(|pattern| pattern.captures(message))
            .map(|caps| RuleMatch::InterfaceState {
                interface: caps[1].to_owned(),
                state: caps[2].to_owned(),
            })
    }
}

fn is_config_update(message: &str) -> bool {
    if CONFIG_PHRASES.iter().any(|p| message.contains(p)) {
        return true;
    }
    let lower = message.to_lowercase();
    CONFIG_PHRASES_CASELESS.iter().any(|p| lower.contains(p))
}

/// nap 디스패처 -- 규칙 엔진과 발행기 한 쌍
pub struct NapDispatcher<P> {
    name: String,
    rules: Arc<NapRules>,
    triggers: BTreeMap<String, Trigger>,
    publisher: P,
    publish_timeout: Option<Duration>,
    metrics: Arc<dyn MetricsSink>,
}

impl<P: EventPublisher> NapDispatcher<P> {
    /// 새 디스패처를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        rules: Arc<NapRules>,
        triggers: BTreeMap<String, Trigger>,
        publisher: P,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            name: name.into(),
            rules,
            triggers,
            publisher,
            publish_timeout: None,
            metrics,
        }
    }

    /// 발행 타임아웃을 설정합니다. 0이면 타임아웃이 없습니다.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// 디스패처 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 발행기
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// 이벤트 하나를 처리합니다. 발행에 성공하면 `true`.
    ///
    /// 발행 실패는 기록하고 삼킵니다. 재시도하지 않습니다.
    pub async fn handle_event(&self, event: &Event) -> bool {
        let Some(rule) = self.rules.evaluate(event) else {
            return false;
        };
        let trigger_name = rule.trigger();
        self.metrics
            .increment(DISPATCH_RULE_MATCHES_TOTAL, &[(LABEL_TRIGGER, trigger_name)], 1);

        let Some(trigger) = self.triggers.get(trigger_name) else {
            warn!(
                dispatcher = self.name.as_str(),
                trigger = trigger_name,
                "rule fired for unconfigured trigger"
            );
            return false;
        };

        let mut matched = event.clone();
        rule.apply(&mut matched);

        let result = match self.publish_timeout {
            Some(limit) => tokio::time::timeout(limit, self.publisher.send(&matched, trigger))
                .await
                .unwrap_or_else(|_| {
                    Err(DispatchError::Publish(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
            None => self.publisher.send(&matched, trigger).await,
        };

        let labels = [(LABEL_TRIGGER, trigger_name)];
        match result {
            Ok(()) => {
                self.metrics.increment(DISPATCH_PUBLISHED_TOTAL, &labels, 1);
                debug!(
                    dispatcher = self.name.as_str(),
                    trigger = trigger_name,
                    routing_key = trigger.routing_key.as_str(),
                    "event published"
                );
                true
            }
            Err(e) => {
                self.metrics
                    .increment(DISPATCH_PUBLISH_FAILURES_TOTAL, &labels, 1);
                warn!(
                    dispatcher = self.name.as_str(),
                    trigger = trigger_name,
                    error = %e,
                    "publish failed, event dropped"
                );
                false
            }
        }
    }

    /// 배치를 순서대로 처리하고 발행한 이벤트 수를 반환합니다.
    pub async fn handle_batch(&self, batch: &[Event]) -> usize {
        let mut sent = 0;
        for event in batch {
            if self.handle_event(event).await {
                sent += 1;
            }
        }
        sent
    }

    /// 배치 큐를 소비하는 루프를 실행합니다.
    ///
    /// 큐가 닫히면 종료합니다. 취소되면 배처의 마지막 배치를 받을 수 있도록
    /// 큐가 닫힐 때까지 잠시 더 소비한 뒤 종료합니다. 발행한 이벤트 수를 반환합니다.
    pub async fn run(&self, mut rx: mpsc::Receiver<Batch>, cancel: CancellationToken) -> u64 {
        info!(dispatcher = self.name.as_str(), "dispatcher started");
        let mut published = 0u64;

        loop {
            tokio::select! {
                batch = rx.recv() => match batch {
                    Some(batch) => published += self.handle_batch(&batch).await as u64,
                    None => break,
                },
                _ = cancel.cancelled() => {
                    debug!(dispatcher = self.name.as_str(), "dispatcher draining queue");
                    let deadline = Instant::now() + SHUTDOWN_GRACE;
                    while let Ok(Some(batch)) = tokio::time::timeout_at(deadline, rx.recv()).await {
                        published += self.handle_batch(&batch).await as u64;
                    }
                    break;
                }
            }
        }

        info!(dispatcher = self.name.as_str(), published, "dispatcher stopped");
        published
    }
}

impl<P> std::fmt::Debug for NapDispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NapDispatcher")
            .field("name", &self.name)
            .field("triggers", &self.triggers)
            .field("publish_timeout", &self.publish_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwire_core::event::{FIELD_MESSAGE, Fields};
    use logwire_core::metrics::CountingSink;
    use serde_json::Value;

    use crate::publisher::mock::RecordingPublisher;

    fn event(message: impl Into<Value>) -> Event {
        let mut fields = Fields::new();
        fields.insert(FIELD_MESSAGE.to_owned(), message.into());
        Event::new(&b"<34>raw"[..], fields, "test")
    }

    fn triggers() -> BTreeMap<String, Trigger> {
        [
            (TRIGGER_CONFIG_UPDATED, "config", "config.updated"),
            (TRIGGER_INTERFACE_UP_DOWN, "link", "interface.state"),
        ]
        .into_iter()
        .map(|(name, queue, key)| {
            (
                name.to_owned(),
                Trigger {
                    queue: queue.to_owned(),
                    routing_key: key.to_owned(),
                },
            )
        })
        .collect()
    }

    fn dispatcher(
        publisher: RecordingPublisher,
    ) -> (NapDispatcher<RecordingPublisher>, Arc<CountingSink>) {
        let sink = Arc::new(CountingSink::new());
        let rules = Arc::new(NapRules::compile().unwrap());
        (
            NapDispatcher::new("nap-0", rules, triggers(), publisher, sink.clone()),
            sink,
        )
    }

    fn rules() -> NapRules {
        NapRules::compile().unwrap()
    }

    #[test]
    fn config_phrases() {
        let rules = rules();
        for message in [
            "User admin executed the 'write memory' command",
            "UI_COMMIT: commit complete",
            "Attribute Configured by admin",
            "Configured from console by vty0",
            "CONFIGURED FROM 10.0.0.1",
        ] {
            assert_eq!(
                rules.evaluate(&event(message)),
                Some(RuleMatch::ConfigUpdated),
                "{message}"
            );
        }
    }

    #[test]
    fn case_sensitive_phrases_do_not_match_other_case() {
        let rules = rules();
        assert_eq!(rules.evaluate(&event("COMMIT COMPLETE")), None);
        assert_eq!(rules.evaluate(&event("'WRITE MEMORY' COMMAND")), None);
    }

    #[test]
    fn interface_state() {
        let rules = rules();
        assert_eq!(
            rules.evaluate(&event("Interface Gi0/1 is down")),
            Some(RuleMatch::InterfaceState {
                interface: "Gi0/1".to_owned(),
                state: "down".to_owned(),
            })
        );
    }

    #[test]
    fn line_protocol_state() {
        let rules = rules();
        assert_eq!(
            rules.evaluate(&event(
                "Line protocol on Interface GigabitEthernet0/2, changed state to up"
            )),
            Some(RuleMatch::InterfaceState {
                interface: "GigabitEthernet0/2".to_owned(),
                state: "up".to_owned(),
            })
        );
    }

    #[test]
    fn config_rule_wins_over_interface_rule() {
        let rules = rules();
        assert_eq!(
            rules.evaluate(&event("Configured from console; Interface Gi0/1 is up")),
            Some(RuleMatch::ConfigUpdated)
        );
    }

    #[test]
    fn missing_or_non_string_message_never_matches() {
        let rules = rules();
        assert_eq!(rules.evaluate(&event(42)), None);
        let empty = Event::new(&b"<34>x"[..], Fields::new(), "test");
        assert_eq!(rules.evaluate(&empty), None);
        assert_eq!(rules.evaluate(&event("nothing interesting")), None);
    }

    #[tokio::test]
    async fn config_update_sends_once() {
        let publisher = RecordingPublisher::new();
        let (dispatcher, sink) = dispatcher(publisher.clone());

        assert!(
            dispatcher
                .handle_event(&event("Configured from console by vty0"))
                .await
        );

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].routing_key, "config.updated");
        assert_eq!(sent[0].queue, "config");
        assert_eq!(
            sink.get(DISPATCH_PUBLISHED_TOTAL, &[(LABEL_TRIGGER, TRIGGER_CONFIG_UPDATED)]),
            1
        );
    }

    #[tokio::test]
    async fn interface_event_is_augmented_on_a_copy() {
        let publisher = RecordingPublisher::new();
        let (dispatcher, _) = dispatcher(publisher.clone());
        let original = event("Interface Gi0/1 is down");

        assert!(dispatcher.handle_event(&original).await);

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].routing_key, "interface.state");
        assert_eq!(sent[0].record[FIELD_INTERFACE], "Gi0/1");
        assert_eq!(sent[0].record[FIELD_STATE], "down");
        assert!(original.fields().get(FIELD_INTERFACE).is_none());
    }

    #[tokio::test]
    async fn publish_failure_is_counted_and_swallowed() {
        let (dispatcher, sink) = dispatcher(RecordingPublisher::failing());
        let batch = vec![
            event("Configured from console"),
            event("Interface Gi0/1 is up"),
        ];

        assert_eq!(dispatcher.handle_batch(&batch).await, 0);
        assert_eq!(sink.total(DISPATCH_PUBLISH_FAILURES_TOTAL), 2);
        assert_eq!(sink.total(DISPATCH_RULE_MATCHES_TOTAL), 2);
    }

    #[tokio::test]
    async fn batch_continues_past_unmatched_events() {
        let publisher = RecordingPublisher::new();
        let (dispatcher, _) = dispatcher(publisher.clone());
        let batch = vec![
            event(7),
            event("noise"),
            event("Interface Eth1/1 is up"),
        ];
        assert_eq!(dispatcher.handle_batch(&batch).await, 1);
    }

    #[tokio::test]
    async fn run_exits_when_queue_closes() {
        let publisher = RecordingPublisher::new();
        let (dispatcher, _) = dispatcher(publisher.clone());
        let (tx, rx) = mpsc::channel::<Batch>(4);

        tx.send(vec![event("commit complete")].into()).await.unwrap();
        drop(tx);

        let published = dispatcher.run(rx, CancellationToken::new()).await;
        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn run_drains_after_cancel() {
        let publisher = RecordingPublisher::new();
        let (dispatcher, _) = dispatcher(publisher.clone());
        let (tx, rx) = mpsc::channel::<Batch>(4);
        let cancel = CancellationToken::new();

        tx.send(vec![event("commit complete")].into()).await.unwrap();
        tx.send(vec![event("Interface Gi0/3 is up")].into()).await.unwrap();
        cancel.cancel();
        drop(tx);

        assert_eq!(dispatcher.run(rx, cancel).await, 2);
        assert_eq!(publisher.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_timeout_counts_as_failure() {
        struct Stalled;
        impl EventPublisher for Stalled {
            async fn send(&self, _: &Event, _: &Trigger) -> Result<(), DispatchError> {
                std::future::pending().await
            }
        }

        let sink = Arc::new(CountingSink::new());
        let dispatcher = NapDispatcher::new(
            "nap-0",
            Arc::new(rules()),
            triggers(),
            Stalled,
            sink.clone(),
        )
        .with_publish_timeout(Duration::from_secs(1));

        assert!(!dispatcher.handle_event(&event("commit complete")).await);
        assert_eq!(sink.total(DISPATCH_PUBLISH_FAILURES_TOTAL), 1);
    }
}

//! 디스패처 레지스트리 -- 설정된 디스패처 집합 생성
//!
//! 1. 모든 인스턴스를 먼저 검증합니다. 하나라도 실패하면 브로커 연결 없이 전체 로드가 중단됩니다.
//! 2. 각 인스턴스의 발행기를 연결합니다. 브로커 설정 실패는 해당 인스턴스만 비활성화하며
//!    [`Registry::failures`]로 보고됩니다.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logwire_core::event::Batch;
use logwire_core::metrics::{DISPATCH_SETUP_FAILURES_TOTAL, MetricsSink};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{self, DispatcherInstance, DispatcherKind};
use crate::error::DispatchError;
use crate::nap::{NapDispatcher, NapRules};
use crate::publisher::AmqpPublisher;

/// 실행 가능한 디스패처
#[derive(Debug)]
pub enum Dispatcher {
    /// nap 규칙 엔진 + AMQP 발행기
    Nap(NapDispatcher<AmqpPublisher>),
}

impl Dispatcher {
    /// 디스패처 이름
    pub fn name(&self) -> &str {
        match self {
            Self::Nap(d) => d.name(),
        }
    }

    /// 디스패처 종류
    pub fn kind(&self) -> DispatcherKind {
        match self {
            Self::Nap(_) => DispatcherKind::Nap,
        }
    }

    /// 배치 큐를 소비합니다. 종료 시 브로커 연결을 닫습니다.
    pub async fn run(self, rx: mpsc::Receiver<Batch>, cancel: CancellationToken) -> u64 {
        match self {
            Self::Nap(d) => {
                let published = d.run(rx, cancel).await;
                d.publisher().close().await;
                published
            }
        }
    }
}

/// 브로커 설정에 실패한 인스턴스
#[derive(Debug)]
pub struct SetupFailure {
    /// 인스턴스 이름
    pub name: String,
    /// 실패 원인
    pub error: DispatchError,
}

/// 디스패처 시간 제한
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// 브로커 연결과 토폴로지 선언 전체
    pub connect: Duration,
    /// 발행 1건 (0이면 없음)
    pub publish: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            publish: Duration::ZERO,
        }
    }
}

/// 디스패처 집합
#[derive(Debug, Default)]
pub struct Registry {
    dispatchers: Vec<Dispatcher>,
    failures: Vec<SetupFailure>,
}

impl Registry {
    /// 설정 파일을 읽어 디스패처 집합을 생성합니다.
    pub async fn load(
        path: impl AsRef<Path>,
        timeouts: Timeouts,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, DispatchError> {
        let path = path.as_ref();
        let instances = config::load(path).await?;
        info!(
            path = %path.display(),
            instances = instances.len(),
            "dispatcher config loaded"
        );
        Self::build(instances, timeouts, metrics).await
    }

    /// 인스턴스 목록에서 디스패처 집합을 생성합니다.
    ///
    /// 검증 에러는 전체를 중단시키고, 브로커 설정 실패는 해당 인스턴스만 제외합니다.
    /// 브로커 연결은 인스턴스마다 동시에 진행되므로 전체 소요 시간은
    /// `timeouts.connect` 하나로 제한됩니다.
    pub async fn build(
        instances: Vec<DispatcherInstance>,
        timeouts: Timeouts,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, DispatchError> {
        let kinds = instances
            .iter()
            .enumerate()
            .map(|(index, instance)| instance.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = Arc::new(NapRules::compile()?);
        let mut connecting = JoinSet::new();

        for (index, (instance, kind)) in instances.into_iter().zip(kinds).enumerate() {
            let name = format!("{kind}-{index}");
            match kind {
                DispatcherKind::Elasticsearch => {
                    info!(
                        dispatcher = name.as_str(),
                        "indexing is handled by the external engine, skipping"
                    );
                }
                DispatcherKind::Nap => {
                    connecting.spawn(async move {
                        let result = AmqpPublisher::connect(&instance, timeouts.connect).await;
                        (index, name, instance, result)
                    });
                }
            }
        }

        let mut connected = Vec::with_capacity(connecting.len());
        while let Some(joined) = connecting.join_next().await {
            match joined {
                Ok(outcome) => connected.push(outcome),
                Err(e) => error!(error = %e, "broker setup task failed"),
            }
        }
        connected.sort_by_key(|(index, ..)| *index);

        let mut registry = Self::default();
        for (_, name, instance, result) in connected {
            match result {
                Ok(publisher) => {
                    info!(
                        dispatcher = name.as_str(),
                        exchange = publisher.exchange(),
                        triggers = instance.triggers.len(),
                        "dispatcher ready"
                    );
                    let dispatcher = NapDispatcher::new(
                        name,
                        Arc::clone(&rules),
                        instance.triggers,
                        publisher,
                        Arc::clone(&metrics),
                    )
                    .with_publish_timeout(timeouts.publish);
                    registry.dispatchers.push(Dispatcher::Nap(dispatcher));
                }
                Err(e) => {
                    metrics.increment(DISPATCH_SETUP_FAILURES_TOTAL, &[], 1);
                    error!(
                        dispatcher = name.as_str(),
                        error = %e,
                        "dispatcher disabled"
                    );
                    registry.failures.push(SetupFailure { name, error: e });
                }
            }
        }

        Ok(registry)
    }

    /// 활성 디스패처
    pub fn dispatchers(&self) -> &[Dispatcher] {
        &self.dispatchers
    }

    /// 활성 디스패처를 꺼냅니다.
    pub fn into_dispatchers(self) -> Vec<Dispatcher> {
        self.dispatchers
    }

    /// 브로커 설정에 실패한 인스턴스
    pub fn failures(&self) -> &[SetupFailure] {
        &self.failures
    }

    /// 활성 디스패처 수
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    /// 활성 디스패처가 없으면 `true`
    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

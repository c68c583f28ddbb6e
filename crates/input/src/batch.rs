//! 이벤트 배치 -- 인메모리 버퍼링 및 소비자 팬아웃
//!
//! [`Batcher`]는 수집된 이벤트를 모아 배치 크기 또는 시간 간격에 따라
//! 플러시하고, 같은 [`Batch`](`Arc<[Event]>`)를 등록된 모든 소비자 큐로 보냅니다.
//!
//! # 소비자 큐 정책
//! 소비자 큐는 용량이 제한됩니다. 큐가 가득 찬 소비자는 그 배치를 받지 못하며
//! (카운터 증가 + 경고), 다른 소비자와 수집 단계는 멈추지 않습니다.
//! 닫힌 큐는 소비자 목록에서 제거됩니다.

use std::sync::Arc;
use std::time::Duration;

use logwire_core::event::{Batch, Event};
use logwire_core::metrics::{INPUT_BATCHES_DROPPED_TOTAL, INPUT_BATCHES_TOTAL, MetricsSink};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 취소 후 수집 채널이 닫히기를 기다리는 최대 시간
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Consumer {
    name: String,
    tx: mpsc::Sender<Batch>,
}

/// 배치 버퍼 및 팬아웃
pub struct Batcher {
    buffer: Vec<Event>,
    batch_size: usize,
    flush_interval: Duration,
    consumers: Vec<Consumer>,
    metrics: Arc<dyn MetricsSink>,
    flushed: u64,
}

impl Batcher {
    /// 새 배처를 생성합니다.
    pub fn new(batch_size: usize, flush_interval: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            buffer: Vec::with_capacity(batch_size.min(10_000)),
            batch_size,
            flush_interval,
            consumers: Vec::new(),
            metrics,
            flushed: 0,
        }
    }

    /// 소비자를 등록하고 배치 수신 큐를 반환합니다.
    pub fn subscribe(&mut self, name: impl Into<String>, capacity: usize) -> mpsc::Receiver<Batch> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.consumers.push(Consumer {
            name: name.into(),
            tx,
        });
        rx
    }

    /// 등록된 소비자 수
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// 현재 버퍼에 쌓인 이벤트 수
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// 이벤트를 추가하고, 배치 크기에 도달하면 플러시합니다.
    pub fn push(&mut self, event: Event) {
        self.buffer.push(event);
        if self.buffer.len() >= self.batch_size {
            self.flush();
        }
    }

    /// 버퍼를 배치로 만들어 모든 소비자에게 보냅니다.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch: Batch = std::mem::take(&mut self.buffer).into();
        self.flushed += 1;
        self.metrics.increment(INPUT_BATCHES_TOTAL, &[], 1);
        debug!(
            events = batch.len(),
            consumers = self.consumers.len(),
            "flushing batch"
        );

        let metrics = &self.metrics;
        self.consumers.retain(|consumer| {
            match consumer.tx.try_send(Arc::clone(&batch)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    metrics.increment(INPUT_BATCHES_DROPPED_TOTAL, &[], 1);
                    warn!(
                        consumer = consumer.name.as_str(),
                        events = batch.len(),
                        "consumer queue full, dropped batch"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    metrics.increment(INPUT_BATCHES_DROPPED_TOTAL, &[], 1);
                    warn!(
                        consumer = consumer.name.as_str(),
                        "consumer queue closed, removing consumer"
                    );
                    false
                }
            }
        });
    }

    /// 수집 채널에서 이벤트를 받아 배치로 묶는 루프를 실행합니다.
    ///
    /// 수집 채널이 닫히거나 취소되면 남은 이벤트를 플러시하고 종료합니다.
    /// 취소 시에는 수집 단계가 마지막 메시지를 보낼 수 있도록 채널이 닫히기를
    /// 잠시 기다립니다. 플러시한 배치 수를 반환합니다.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Event>, cancel: CancellationToken) -> u64 {
        let mut interval = tokio::time::interval(self.flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // 첫 tick은 즉시 완료된다
        interval.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.push(event),
                    None => {
                        debug!("intake channel closed");
                        break;
                    }
                },
                _ = interval.tick() => self.flush(),
                _ = cancel.cancelled() => {
                    info!("batcher received shutdown signal, draining intake");
                    self.drain(&mut rx).await;
                    break;
                }
            }
        }

        self.flush();
        info!(batches = self.flushed, "batcher stopped");
        self.flushed
    }

    async fn drain(&mut self, rx: &mut mpsc::Receiver<Event>) {
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => self.push(event),
                Ok(None) => return,
                Err(_) => {
                    warn!("intake channel still open after grace period");
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("pending", &self.buffer.len())
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

//! TCP syslog 수집기
//!
//! 각 TCP 연결은 별도의 tokio 태스크에서 [`Ingest::ingest_stream`]으로 처리됩니다.
//! 연결 수는 세마포어로 제한하며, 한도를 넘는 연결은 즉시 닫습니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use logwire_core::metrics::{INPUT_CONNECTIONS_TOTAL, LABEL_PROTOCOL};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CollectorStatus, Ingest};
use crate::error::InputError;

/// TCP 수집기 설정
#[derive(Debug, Clone)]
pub struct TcpCollectorConfig {
    /// 바인드 주소 (예: "0.0.0.0:5514")
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 연결 유휴 타임아웃 (초, 0이면 없음)
    pub connection_timeout_secs: u64,
}

impl Default for TcpCollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5514".to_owned(),
            max_connections: 256,
            connection_timeout_secs: 300, // 5 minutes
        }
    }
}

/// TCP syslog 수집기
pub struct TcpCollector {
    config: TcpCollectorConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    ingest: Ingest,
    semaphore: Arc<Semaphore>,
    status: CollectorStatus,
}

impl TcpCollector {
    /// 소켓을 바인드하여 수집기를 생성합니다.
    pub async fn bind(config: TcpCollectorConfig, ingest: Ingest) -> Result<Self, InputError> {
        let listener =
            TcpListener::bind(&config.bind_addr)
                .await
                .map_err(|e| InputError::Collector {
                    source_type: "tcp".to_owned(),
                    reason: format!("failed to bind to {}: {}", config.bind_addr, e),
                })?;
        let local_addr = listener.local_addr()?;
        let ingest =
            ingest.with_idle_timeout(Duration::from_secs(config.connection_timeout_secs));

        info!(bind_addr = %local_addr, "TCP collector bound");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            config,
            listener,
            local_addr,
            ingest,
            status: CollectorStatus::Idle,
        })
    }

    /// 실제 바인드된 주소 (포트 0 바인드 시 할당된 포트 확인용)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 현재 활성 연결 수
    pub fn active_connections(&self) -> usize {
        self.config.max_connections - self.semaphore.available_permits()
    }

    /// 현재 상태
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 연결 수락 루프를 실행합니다.
    ///
    /// 취소되면 새 연결 수락을 멈추고, 진행 중인 연결 태스크가 남은 메시지를
    /// 방출하고 끝날 때까지 기다립니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), InputError> {
        self.status = CollectorStatus::Running;
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // accept 실패는 해당 연결에 국한된다 (EMFILE 등)
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                        warn!(%peer, max = self.config.max_connections, "max connections reached, rejecting");
                        continue;
                    };

                    self.ingest
                        .parser()
                        .metrics()
                        .increment(INPUT_CONNECTIONS_TOTAL, &[(LABEL_PROTOCOL, "tcp")], 1);
                    debug!(%peer, "accepted connection");

                    let ingest = self.ingest.clone();
                    let cancel = cancel.clone();
                    let source = format!("tcp:{}[{}]", self.local_addr, peer);
                    connections.spawn(async move {
                        match ingest.ingest_stream(stream, &source, &cancel).await {
                            Ok(events) => debug!(source, events, "connection finished"),
                            Err(e) => error!(source, error = %e, "connection handler error"),
                        }
                        drop(permit);
                    });

                    // 끝난 연결 태스크 회수
                    while connections.try_join_next().is_some() {}
                }
                _ = cancel.cancelled() => {
                    info!("TCP collector received shutdown signal");
                    break;
                }
            }
        }

        while connections.join_next().await.is_some() {}
        self.status = CollectorStatus::Stopped;
        Ok(())
    }
}

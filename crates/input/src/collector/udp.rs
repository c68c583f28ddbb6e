//! UDP syslog 수집기
//!
//! 각 데이터그램을 독립된 스트림으로 보고 새 구분자로 프레이밍합니다.

use std::net::SocketAddr;

use logwire_core::metrics::{INPUT_CONNECTIONS_TOTAL, LABEL_PROTOCOL};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CollectorStatus, Ingest};
use crate::error::InputError;

/// UDP 수집기 설정
#[derive(Debug, Clone)]
pub struct UdpCollectorConfig {
    /// 바인드 주소 (예: "0.0.0.0:5514")
    pub bind_addr: String,
    /// 최대 데이터그램 크기 (바이트)
    pub max_datagram_size: usize,
}

impl Default for UdpCollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5514".to_owned(),
            max_datagram_size: 65535,
        }
    }
}

/// UDP syslog 수집기
pub struct UdpCollector {
    config: UdpCollectorConfig,
    socket: UdpSocket,
    local_addr: SocketAddr,
    ingest: Ingest,
    status: CollectorStatus,
}

impl UdpCollector {
    /// 소켓을 바인드하여 수집기를 생성합니다.
    pub async fn bind(config: UdpCollectorConfig, ingest: Ingest) -> Result<Self, InputError> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|e| InputError::Collector {
                source_type: "udp".to_owned(),
                reason: format!("failed to bind to {}: {}", config.bind_addr, e),
            })?;
        let local_addr = socket.local_addr()?;
        info!(bind_addr = %local_addr, "UDP collector bound");

        Ok(Self {
            config,
            socket,
            local_addr,
            ingest,
            status: CollectorStatus::Idle,
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 현재 상태
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 데이터그램 수신 루프를 실행합니다. 취소될 때까지 실행됩니다.
    ///
    /// 이벤트 채널이 닫히면 에러로 종료합니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), InputError> {
        self.status = CollectorStatus::Running;
        let mut buf = vec![0u8; self.config.max_datagram_size.max(1)];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "UDP receive failed");
                            continue;
                        }
                    };

                    self.ingest
                        .parser()
                        .metrics()
                        .increment(INPUT_CONNECTIONS_TOTAL, &[(LABEL_PROTOCOL, "udp")], 1);

                    let source = format!("udp:{}[{}]", self.local_addr, peer);
                    match self.ingest.ingest_datagram(&buf[..len], &source).await {
                        Ok(events) => debug!(source, events, len, "datagram processed"),
                        Err(e) => {
                            self.status = CollectorStatus::Error(e.to_string());
                            return Err(e);
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("UDP collector received shutdown signal");
                    break;
                }
            }
        }

        self.status = CollectorStatus::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UdpCollectorConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5514");
        assert_eq!(config.max_datagram_size, 65535);
    }
}

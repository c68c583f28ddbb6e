//! 로그 수집 모듈 -- 네트워크 소스에서 바이트를 받아 이벤트로 변환합니다.
//!
//! # 수집 소스
//! - [`TcpCollector`]: TCP 연결마다 하나의 태스크가 스트림을 프레이밍
//! - [`UdpCollector`]: 데이터그램마다 새 구분자로 프레이밍
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, [`Ingest`]가 바이트를
//! 구분자에 밀어 넣고 완성된 메시지를 파싱하여 `mpsc::Sender<Event>`로 보냅니다.

pub mod tcp;
pub mod udp;

pub use tcp::{TcpCollector, TcpCollectorConfig};
pub use udp::{UdpCollector, UdpCollectorConfig};

use std::time::Duration;

use logwire_core::event::Event;
use logwire_core::metrics::INPUT_EVENTS_TOTAL;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::InputError;
use crate::parser::Parser;

/// 한 번에 읽는 바이트 수
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

/// 바이트 -> 메시지 -> 이벤트 변환 단계
///
/// 연결/데이터그램마다 복제하여 사용합니다. 내부 패턴과 채널은 공유됩니다.
#[derive(Debug, Clone)]
pub struct Ingest {
    parser: Parser,
    max_message_size: usize,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<Event>,
}

impl Ingest {
    /// 새 수집 단계를 생성합니다.
    pub fn new(parser: Parser, max_message_size: usize, tx: mpsc::Sender<Event>) -> Self {
        Self {
            parser,
            max_message_size,
            idle_timeout: None,
            tx,
        }
    }

    /// 스트림 유휴 타임아웃을 설정합니다. 0이면 타임아웃이 없습니다.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// 파서
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// 스트림을 끝까지 읽으며 이벤트를 생성합니다.
    ///
    /// EOF, 유휴 타임아웃, 취소 중 하나가 발생하면 남은 메시지(vestige)를
    /// 방출하고 종료합니다. 생성한 이벤트 수를 반환합니다.
    pub async fn ingest_stream<R>(
        &self,
        mut reader: R,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, InputError>
    where
        R: AsyncRead + Unpin,
    {
        let mut delimiter = self.parser.delimiter(self.max_message_size);
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut produced = 0u64;

        let outcome: Result<(), InputError> = async {
            loop {
                let read = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(source, "ingest received shutdown signal");
                        return Ok(());
                    }
                    result = read_chunk(&mut reader, &mut chunk, self.idle_timeout) => result?,
                };

                let Some(read) = read else {
                    warn!(source, "stream idle timeout, closing");
                    return Ok(());
                };
                if read == 0 {
                    debug!(source, "stream closed by peer");
                    return Ok(());
                }

                for byte in &chunk[..read] {
                    if let Some(message) = delimiter.push(*byte) {
                        self.emit(message, source).await?;
                        produced += 1;
                    }
                }
            }
        }
        .await;

        if let Some(message) = delimiter.vestige() {
            // 채널이 닫혀 앞서 실패했다면 vestige 전송도 실패하므로 첫 에러를 유지한다
            if outcome.is_ok() {
                self.emit(message, source).await?;
                produced += 1;
            }
        }

        outcome.map(|()| produced)
    }

    /// 데이터그램 하나를 독립된 스트림으로 프레이밍하여 이벤트를 생성합니다.
    ///
    /// 우선순위 앵커가 없는 데이터그램도 한 건의 미파싱 이벤트로 전달합니다.
    pub async fn ingest_datagram(&self, data: &[u8], source: &str) -> Result<u64, InputError> {
        let mut delimiter = self.parser.delimiter(self.max_message_size);
        let mut messages = delimiter.push_all(data);
        messages.extend(delimiter.vestige());

        if messages.is_empty() {
            let end = data
                .iter()
                .rposition(|b| !b.is_ascii_whitespace())
                .map_or(0, |pos| pos + 1);
            if end == 0 {
                return Ok(0);
            }
            let content = &data[..end.min(self.max_message_size)];
            debug!(
                source,
                bytes = content.len(),
                "datagram without priority anchor, forwarding raw"
            );
            messages.push(String::from_utf8_lossy(content).into_owned());
        }

        let mut produced = 0u64;
        for message in messages {
            self.emit(message, source).await?;
            produced += 1;
        }
        Ok(produced)
    }

    async fn emit(&self, message: String, source: &str) -> Result<(), InputError> {
        let event = self.parser.event(message.into_bytes(), source);
        self.parser
            .metrics()
            .increment(INPUT_EVENTS_TOTAL, &[], 1);
        self.tx
            .send(event)
            .await
            .map_err(|e| InputError::Channel(e.to_string()))
    }
}

/// 청크 하나를 읽습니다. 유휴 타임아웃이 지나면 `Ok(None)`.
async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> Result<Option<usize>, InputError>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.read(buf)).await {
            Ok(result) => Ok(Some(result?)),
            Err(_) => Ok(None),
        },
        None => Ok(Some(reader.read(buf).await?)),
    }
}

//! 통합 테스트 -- 수집 단계 전체 흐름 검증
//!
//! 소켓 수신부터 프레이밍, 파싱, 배치 팬아웃까지의 흐름을 검증합니다.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use logwire_core::event::{Event, FIELD_APP, FIELD_IDENTIFIER, FIELD_MESSAGE};
use logwire_core::metrics::{CountingSink, INPUT_CONNECTIONS_TOTAL, LABEL_PROTOCOL};
use logwire_input::{
    Batcher, Format, Ingest, InputPatterns, Parser, TcpCollector, TcpCollectorConfig,
    UdpCollector, UdpCollectorConfig,
};

const LINE: &str = "<34>Oct 11 22:14:15 mymachine evt: %SYS-5-CONFIG_I: Configured from console";

fn patterns() -> Arc<InputPatterns> {
    Arc::new(InputPatterns::compile().expect("patterns compile"))
}

fn ingest(format: Format) -> (Ingest, mpsc::Receiver<Event>, Arc<CountingSink>) {
    let sink = Arc::new(CountingSink::new());
    let parser = Parser::new(format, patterns(), sink.clone());
    let (tx, rx) = mpsc::channel(64);
    (Ingest::new(parser, 4096, tx), rx, sink)
}

async fn recv(rx: &mut mpsc::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

/// TCP 연결로 들어온 스트림이 메시지 단위 이벤트가 되는지 확인
#[tokio::test]
async fn test_tcp_stream_to_events() {
    let (ingest, mut rx, sink) = ingest(Format::Rfc3164);
    let config = TcpCollectorConfig {
        bind_addr: "127.0.0.1:0".to_owned(),
        ..Default::default()
    };
    let collector = TcpCollector::bind(config, ingest).await.unwrap();
    let addr = collector.local_addr();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(collector.run(cancel.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("{LINE}\n{LINE}").as_bytes())
        .await
        .unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);

    let first = recv(&mut rx).await;
    let second = recv(&mut rx).await;
    for event in [&first, &second] {
        assert!(event.is_parsed());
        assert_eq!(event.fields()[FIELD_IDENTIFIER], "evt");
        assert_eq!(event.fields()[FIELD_APP], "%SYS-5-CONFIG_I");
        assert_eq!(event.fields()[FIELD_MESSAGE], "Configured from console");
        assert!(event.source().starts_with("tcp:"));
    }
    assert_eq!(
        sink.get(INPUT_CONNECTIONS_TOTAL, &[(LABEL_PROTOCOL, "tcp")]),
        1
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

/// UDP 데이터그램 하나가 독립 스트림으로 처리되는지 확인
#[tokio::test]
async fn test_udp_datagram_to_event() {
    let (ingest, mut rx, _) = ingest(Format::Rfc5424);
    let config = UdpCollectorConfig {
        bind_addr: "127.0.0.1:0".to_owned(),
        ..Default::default()
    };
    let collector = UdpCollector::bind(config, ingest).await.unwrap();
    let addr = collector.local_addr();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(collector.run(cancel.clone()));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(
            b"<165>1 2003-10-11T22:14:15.003Z host app 1234 ID47 - datagram body",
            addr,
        )
        .await
        .unwrap();

    let event = recv(&mut rx).await;
    assert!(event.is_parsed());
    assert_eq!(event.message(), Some("datagram body"));
    assert_eq!(event.priority(), Some(165));

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

/// 수집 -> 배처 -> 소비자 큐 흐름
#[tokio::test]
async fn test_ingest_to_batches() {
    let (ingest, rx, _) = ingest(Format::Rfc3164);
    let metrics = Arc::new(CountingSink::new());
    let mut batcher = Batcher::new(2, Duration::from_secs(60), metrics);
    let mut first = batcher.subscribe("first", 8);
    let mut second = batcher.subscribe("second", 8);

    let cancel = CancellationToken::new();
    let batcher_handle = tokio::spawn(batcher.run(rx, cancel.clone()));

    let input = format!("{LINE}\n{LINE}\n{LINE}\n");
    let produced = ingest
        .ingest_stream(input.as_bytes(), "test", &cancel)
        .await
        .unwrap();
    assert_eq!(produced, 3);
    drop(ingest);

    let flushed = batcher_handle.await.unwrap();
    assert_eq!(flushed, 2);

    let sizes: Vec<usize> = std::iter::from_fn(|| first.try_recv().ok())
        .map(|b| b.len())
        .collect();
    assert_eq!(sizes, vec![2, 1]);
    assert_eq!(
        std::iter::from_fn(|| second.try_recv().ok()).count(),
        2
    );
}

fn delimiter(format: Format, max_size: usize) -> logwire_input::Delimiter {
    let sink = Arc::new(CountingSink::new());
    Parser::new(format, patterns(), sink).delimiter(max_size)
}

proptest! {
    /// 어떤 입력에서도 구분자 버퍼가 경계 여유분을 포함한 용량을 넘지 않는다
    #[test]
    fn prop_buffer_never_exceeds_capacity(
        bytes in proptest::collection::vec(any::<u8>(), 0..2048),
        max_size in 8usize..256,
    ) {
        let mut delimiter = delimiter(Format::Rfc3164, max_size);
        for byte in bytes {
            let _ = delimiter.push(byte);
            prop_assert!(delimiter.buffered() <= delimiter.capacity());
        }
    }

    /// 개행으로 이어진 N개 메시지는 push로 N-1개, vestige로 1개가 나온다
    #[test]
    fn prop_n_messages_round_trip(
        bodies in proptest::collection::vec("[a-z0-9 ]{1,40}", 1..20),
        slack in 0usize..3,
    ) {
        let messages: Vec<String> = bodies
            .iter()
            .map(|body| format!("<34>Jan 12 06:30:00 sw1 : %SYS-5-RESTART: x{body}"))
            .collect();
        let stream = messages.join("\n");

        // 가장 긴 메시지에 딱 맞는 한도에서도 손실이 없어야 한다
        let longest = messages.iter().map(String::len).max().unwrap_or(0);
        let mut delimiter = delimiter(Format::Rfc3164, longest + slack);
        let mut out = delimiter.push_all(stream.as_bytes());
        prop_assert_eq!(out.len(), messages.len() - 1);
        out.extend(delimiter.vestige());
        prop_assert_eq!(out, messages);
    }
}

//! 구분자 / 파서 벤치마크
//!
//! 스트림 프레이밍과 방언 체인 파싱의 처리량을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logwire_core::metrics::CountingSink;
use logwire_input::{Format, InputPatterns, Parser};

/// 체인 앞쪽에서 매칭되는 Cisco 메시지
const CISCO: &[u8] = b"<189>Jan 12 06:30:00 10.0.0.1 : %SYS-5-CONFIG_I: Configured from console by admin on vty0";

/// 체인 중간에서 매칭되는 Fortinet 메시지
const FORTINET: &[u8] = b"<189>date=2024-01-15 time=12:00:00 devname=fw01 devid=FG100E logid=0000000013 type=traffic subtype=forward level=notice vd=root srcip=10.1.1.1 dstip=8.8.8.8 action=accept";

/// 체인 끝에서 매칭되는 IOS 메시지
const IOS: &[u8] = b"<189>123: *Mar  1 18:46:11: %LINK-3-UPDOWN: Interface GigabitEthernet0/1, changed state to up";

/// RFC 5424 메시지 (structured data 포함)
const RFC5424: &[u8] = b"<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog - ID47 [exampleSDID@32473 iut=\"3\" eventSource=\"Application\"] An application event log entry";

fn parser(format: Format) -> Parser {
    let patterns = Arc::new(InputPatterns::compile().unwrap());
    Parser::new(format, patterns, Arc::new(CountingSink::new()))
}

fn bench_rfc3164_chain(c: &mut Criterion) {
    let parser = parser(Format::Rfc3164);
    let mut group = c.benchmark_group("rfc3164_chain");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [("cisco", CISCO), ("fortinet", FORTINET), ("ios", IOS)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| parser.parse(black_box(line)))
        });
    }

    group.bench_function("unrecognized", |b| {
        b.iter(|| parser.parse(black_box(b"<34>free text that no dialect accepts")))
    });

    group.finish();
}

fn bench_rfc5424(c: &mut Criterion) {
    let parser = parser(Format::Rfc5424);
    let mut group = c.benchmark_group("rfc5424");
    group.throughput(Throughput::Elements(1));
    group.bench_function("structured_data", |b| {
        b.iter(|| parser.parse(black_box(RFC5424)))
    });
    group.finish();
}

fn bench_delimiter(c: &mut Criterion) {
    let parser = parser(Format::Rfc3164);
    let mut group = c.benchmark_group("delimiter");

    for count in [10usize, 100, 1000] {
        let mut stream = Vec::new();
        for _ in 0..count {
            stream.extend_from_slice(CISCO);
            stream.push(b'\n');
        }
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("messages", count), &stream, |b, stream| {
            b.iter(|| {
                let mut delimiter = parser.delimiter(65536);
                let mut out = delimiter.push_all(black_box(stream));
                out.extend(delimiter.vestige());
                out
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rfc3164_chain, bench_rfc5424, bench_delimiter);
criterion_main!(benches);

//! 이벤트 모델 벤치마크
//!
//! Event 생성, 필드 추가(copy-on-augment), 배치 공유, JSON 직렬화 성능을 측정합니다.

use std::sync::Arc;

use bytes::Bytes;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use logwire_core::event::{
    Batch, Event, FIELD_APP, FIELD_IDENTIFIER, FIELD_MESSAGE, FIELD_PRIORITY, FIELD_TIMESTAMP,
    Fields,
};
use serde_json::Value;

const RAW: &[u8] =
    b"<34>Jan 12 06:30:00 core-sw-01 : %LINK-3-UPDOWN: Interface Gi0/1 is down";

fn sample_fields() -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_PRIORITY.to_owned(), Value::from(34));
    fields.insert(FIELD_TIMESTAMP.to_owned(), Value::from("Jan 12 06:30:00"));
    fields.insert(FIELD_IDENTIFIER.to_owned(), Value::from("core-sw-01"));
    fields.insert(FIELD_APP.to_owned(), Value::from("%LINK-3-UPDOWN"));
    fields.insert(FIELD_MESSAGE.to_owned(), Value::from("Interface Gi0/1 is down"));
    fields
}

fn bench_event_creation(c: &mut Criterion) {
    let raw = Bytes::from_static(RAW);
    let fields = sample_fields();

    let mut group = c.benchmark_group("event_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("event_new", |b| {
        b.iter(|| Event::new(black_box(raw.clone()), black_box(fields.clone()), "bench"))
    });

    group.finish();
}

fn bench_augment(c: &mut Criterion) {
    let event = Event::new(Bytes::from_static(RAW), sample_fields(), "bench");

    c.bench_function("clone_and_augment", |b| {
        b.iter(|| {
            let mut copy = black_box(&event).clone();
            copy.augment("interface", "Gi0/1");
            copy.augment("state", "down");
            copy
        })
    });
}

fn bench_batch_fanout(c: &mut Criterion) {
    let events: Vec<Event> = (0..100)
        .map(|_| Event::new(Bytes::from_static(RAW), sample_fields(), "bench"))
        .collect();
    let batch: Batch = events.into();

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(4));
    group.bench_function("share_with_4_consumers", |b| {
        b.iter(|| {
            let shares: Vec<Batch> = (0..4).map(|_| Arc::clone(black_box(&batch))).collect();
            shares
        })
    });
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let event = Event::new(Bytes::from_static(RAW), sample_fields(), "bench");

    c.bench_function("fields_to_json", |b| {
        b.iter(|| serde_json::to_vec(black_box(event.fields())))
    });
}

criterion_group!(
    benches,
    bench_event_creation,
    bench_augment,
    bench_batch_fanout,
    bench_serialize
);
criterion_main!(benches);

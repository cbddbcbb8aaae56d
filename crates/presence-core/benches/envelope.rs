//! Envelope benchmarks for presence-core.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use presence_core::{batch_array, Envelope, PresenceRecord};
use serde_json::json;

fn userstate_event() -> serde_json::Value {
    json!({
        "id": "evt-1",
        "data": {
            "eventType": "usersub.userstate",
            "user": "person-a",
            "ttl": 600,
            "compositions": [
                {"type": "availability", "composition": {"type": "active"}},
                {"type": "lastActivity", "composition": {"lastActiveTime": "2024-05-01T10:00:00Z"}},
            ],
        },
    })
}

fn bench_classify(c: &mut Criterion) {
    let raw = userstate_event();

    c.bench_function("classify_userstate", |b| {
        b.iter(|| Envelope::from_raw(black_box(&raw)))
    });
}

fn bench_derive_record(c: &mut Criterion) {
    let envelope = Envelope::from_raw(&userstate_event()).unwrap();

    c.bench_function("derive_record", |b| {
        b.iter(|| PresenceRecord::from_event(black_box(envelope.value())))
    });
}

fn bench_batch(c: &mut Criterion) {
    let ids: Vec<String> = (0..1000).map(|i| format!("person-{i}")).collect();

    c.bench_function("batch_1000_by_50", |b| {
        b.iter(|| batch_array(black_box(&ids), 50))
    });
}

criterion_group!(benches, bench_classify, bench_derive_record, bench_batch);
criterion_main!(benches);

use common::AggregateId;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Position, Version};
use tokio::runtime::Runtime;

fn capture(campaign: AggregateId, version: i64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(campaign)
        .aggregate_type("Campaign")
        .event_type("CampaignCaptureRecorded")
        .version(Version::new(version))
        .payload_raw(serde_json::json!({
            "type": "CampaignCaptureRecorded",
            "data": {
                "message_id": "00000000-0000-0000-0000-000000000001",
                "captured_at": "2024-01-01T00:00:00Z"
            }
        }))
        .build()
        .unwrap()
}

/// A store holding `campaigns` streams of `captures` events each.
fn seeded(rt: &Runtime, campaigns: usize, captures: i64) -> (InMemoryEventStore, Vec<AggregateId>) {
    let store = InMemoryEventStore::new();
    let ids: Vec<AggregateId> = (0..campaigns).map(|_| AggregateId::new()).collect();
    rt.block_on(async {
        for &id in &ids {
            let batch = (1..=captures).map(|v| capture(id, v)).collect();
            store.append(batch, AppendOptions::expect_new()).await.unwrap();
        }
    });
    (store, ids)
}

fn bench_expected_version_append(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("event_store/append_next_capture", |b| {
        b.iter_batched(
            || seeded(&rt, 1, 10),
            |(store, ids)| {
                rt.block_on(async {
                    store
                        .append(
                            vec![capture(ids[0], 11)],
                            AppendOptions::expect_version(Version::new(10)),
                        )
                        .await
                        .unwrap();
                });
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_replay_campaign(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (store, ids) = seeded(&rt, 1, 100);

    c.bench_function("event_store/load_campaign_100_captures", |b| {
        b.iter(|| rt.block_on(store.load_stream(ids[0])).unwrap());
    });
}

fn bench_log_page(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (store, _) = seeded(&rt, 100, 10);

    c.bench_function("event_store/log_page_256_from_500", |b| {
        b.iter(|| rt.block_on(store.read_all_from(Position::new(500), 256)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_expected_version_append,
    bench_replay_campaign,
    bench_log_page
);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;
use std::time::Duration;

use carestock_core::{ActorId, ItemId, RecordId, SubjectId};
use carestock_infra::store::{InMemoryStorage, SqliteStorage, Storage};
use carestock_infra::{CoreConfig, CoreServices};
use carestock_inventory::{ItemDetails, MovementRequest, OpeningStock};
use carestock_registry::{RecordPayload, choose_identifier};

fn actor() -> ActorId {
    ActorId::from_raw(1)
}

fn stocked<S: Storage>(core: &CoreServices<S>, quantity: i64) -> ItemId {
    core.ledger
        .register_item(
            ItemDetails::new("Gloves", "PPE"),
            Some(OpeningStock {
                quantity,
                actor_id: actor(),
            }),
        )
        .unwrap()
        .id
}

fn sqlite_services() -> CoreServices<SqliteStorage> {
    let storage = SqliteStorage::connect("sqlite::memory:", Duration::from_secs(5)).unwrap();
    CoreServices::new(Arc::new(storage), &CoreConfig::default())
}

/// Pure hole search over registries of growing size with one hole near the top.
fn bench_choose_identifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("choose_identifier");

    for size in [100i64, 10_000, 100_000] {
        let ids: Vec<RecordId> = (1..=size)
            .filter(|v| *v != size - 1)
            .map(RecordId::from_raw)
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| black_box(choose_identifier(ids.iter().copied())));
        });
    }

    group.finish();
}

fn bench_record_movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_movement");
    group.throughput(Throughput::Elements(2));

    let memory = CoreServices::new(Arc::new(InMemoryStorage::new()), &CoreConfig::default());
    let item = stocked(&memory, 1);
    group.bench_function("in_memory_restock_issue", |b| {
        b.iter(|| {
            memory
                .ledger
                .record_movement(MovementRequest::restock(item, 1, actor()))
                .unwrap();
            memory
                .ledger
                .record_movement(MovementRequest::issue(item, 1, actor(), SubjectId::from_raw(1)))
                .unwrap();
        });
    });

    let sqlite = sqlite_services();
    let item = stocked(&sqlite, 1);
    group.bench_function("sqlite_restock_issue", |b| {
        b.iter(|| {
            sqlite
                .ledger
                .record_movement(MovementRequest::restock(item, 1, actor()))
                .unwrap();
            sqlite
                .ledger
                .record_movement(MovementRequest::issue(item, 1, actor(), SubjectId::from_raw(1)))
                .unwrap();
        });
    });

    group.finish();
}

/// Audit cost as the movement log grows.
fn bench_audit(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit");

    for movements in [100usize, 1_000, 10_000] {
        let core = CoreServices::new(Arc::new(InMemoryStorage::new()), &CoreConfig::default());
        let item = stocked(&core, 0);
        for _ in 0..movements {
            core.ledger
                .record_movement(MovementRequest::restock(item, 1, actor()))
                .unwrap();
        }

        group.throughput(Throughput::Elements(movements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(movements), &core, |b, core| {
            b.iter(|| black_box(core.checker.audit(None).unwrap()));
        });
    }

    group.finish();
}

fn bench_allocate_with_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_with_churn");

    let memory = CoreServices::new(Arc::new(InMemoryStorage::new()), &CoreConfig::default());
    for _ in 0..1_000 {
        memory
            .registry
            .allocate_and_insert(RecordPayload::new("a", "b"))
            .unwrap();
    }
    group.bench_function("in_memory_delete_then_reuse", |b| {
        b.iter(|| {
            memory
                .registry
                .delete_record(RecordId::from_raw(500))
                .unwrap();
            black_box(
                memory
                    .registry
                    .allocate_and_insert(RecordPayload::new("a", "b"))
                    .unwrap(),
            );
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_choose_identifier,
    bench_record_movement,
    bench_audit,
    bench_allocate_with_churn
);
criterion_main!(benches);

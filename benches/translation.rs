//! Benchmarks for the hot paths of a reconciliation: vocabulary lookups,
//! backend selection and cached discovery.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use unified_replication_operator::{
    AdapterConfig, AdapterRegistry, Backend, BackendSelector, ControllerConfig, ControllerEngine,
    Operation, ReplicationMode, ReplicationState, StaticDiscoverer, TranslationEngine,
    UnifiedVolumeReplication, UnifiedVolumeReplicationSpec,
};

fn intent(storage_class: &str) -> UnifiedVolumeReplication {
    let mut uvr = UnifiedVolumeReplication::new(
        "bench",
        UnifiedVolumeReplicationSpec {
            replication_state: ReplicationState::Source,
            replication_mode: ReplicationMode::Asynchronous,
            ..Default::default()
        },
    );
    uvr.metadata.namespace = Some("default".into());
    uvr.spec.source_endpoint.storage_class = storage_class.into();
    uvr
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translation");
    group.throughput(Throughput::Elements(1));

    let engine = TranslationEngine::new().unwrap();

    group.bench_function("state_to_backend", |b| {
        b.iter(|| {
            let _ = engine.translate_state_to_backend(black_box(Backend::PowerStore), black_box("promoting"));
        });
    });

    group.bench_function("state_from_backend_alias", |b| {
        b.iter(|| {
            let _ = engine.translate_state_from_backend(black_box(Backend::Trident), black_box("reestablished"));
        });
    });

    group.bench_function("validate_all", |b| {
        b.iter(|| {
            let _ = engine.validate_all();
        });
    });

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    group.throughput(Throughput::Elements(1));

    let selector = BackendSelector::default();
    let available = Backend::all().to_vec();
    let heuristic = intent("dell-powerstore-metro");
    let fallback = intent("gold-tier");

    group.bench_function("storage_class_heuristic", |b| {
        b.iter(|| {
            let _ = selector.select(black_box(&heuristic), black_box(&available));
        });
    });

    group.bench_function("fallback", |b| {
        b.iter(|| {
            let _ = selector.select(black_box(&fallback), black_box(&available));
        });
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(1));

    let translator = Arc::new(TranslationEngine::new().unwrap());
    let registry = AdapterRegistry::with_defaults(translator.clone(), &AdapterConfig::default(), None);
    let engine = ControllerEngine::new(
        ControllerConfig::default(),
        Arc::new(StaticDiscoverer::ready(Backend::all())),
        translator,
        Arc::new(registry),
    )
    .unwrap();
    let uvr = intent("rook-ceph-block");
    let token = CancellationToken::new();
    let rt = tokio::runtime::Runtime::new().unwrap();

    rt.block_on(async {
        let _ = engine.process_replication(&token, &uvr, Operation::Create).await;
    });

    group.bench_function("cached_select_backend", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = engine.select_backend(&token, black_box(&uvr)).await;
            });
        });
    });

    group.bench_function("sync_in_memory", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = engine.process_replication(&token, black_box(&uvr), Operation::Sync).await;
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_translate, bench_select, bench_pipeline);
criterion_main!(benches);

use std::sync::Arc;
use std::time::Duration;

use common::{ReferenceId, SkuId};
use criterion::{Criterion, criterion_group, criterion_main};
use reservation::{BatchItem, InventoryEngine, RetryConfig};
use stock_store::{InMemoryLedger, InMemoryStockStore, InventoryChangeType};

type Engine = InventoryEngine<InMemoryStockStore, InMemoryLedger>;

fn make_engine() -> Engine {
    let config = RetryConfig::default().with_base_backoff(Duration::from_micros(50));
    InventoryEngine::new(InMemoryStockStore::new(), InMemoryLedger::new(), config)
}

fn bench_adjust_uncontended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = make_engine();
    let sku = SkuId::new();
    rt.block_on(async {
        engine.register_sku(sku, 1).await.unwrap();
    });

    c.bench_function("engine/reserve_release_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reference = ReferenceId::new();
                engine
                    .adjust_single(sku, InventoryChangeType::Reserve, 1, reference)
                    .await
                    .unwrap();
                engine
                    .adjust_single(sku, InventoryChangeType::Release, 1, reference)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = make_engine();
    let skus: Vec<SkuId> = (0..10).map(|_| SkuId::new()).collect();
    rt.block_on(async {
        for sku in &skus {
            engine.register_sku(*sku, 1).await.unwrap();
        }
    });

    c.bench_function("engine/batch_10_reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reserve = skus.iter().map(|sku| BatchItem::reserve(*sku, 1)).collect();
                engine
                    .process_batch(ReferenceId::new(), reserve)
                    .await
                    .unwrap();
                let release = skus.iter().map(|sku| BatchItem::release(*sku, 1)).collect();
                engine
                    .process_batch(ReferenceId::new(), release)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_contended_reservations(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("engine/contended_8x8_reservations", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = Arc::new(make_engine());
                let sku = SkuId::new();
                engine.register_sku(sku, 64).await.unwrap();

                let mut handles = Vec::new();
                for _ in 0..8 {
                    let engine = engine.clone();
                    handles.push(tokio::spawn(async move {
                        for _ in 0..8 {
                            engine
                                .adjust_single(
                                    sku,
                                    InventoryChangeType::Reserve,
                                    1,
                                    ReferenceId::new(),
                                )
                                .await
                                .unwrap();
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_adjust_uncontended,
    bench_batch_10,
    bench_contended_reservations
);
criterion_main!(benches);

//! Stress harness: many workers reserving single units against shared SKUs.

pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{ReferenceId, SkuId};
use futures_util::TryStreamExt;
use reservation::{InventoryEngine, InventoryError};
use stock_store::{
    InMemoryLedger, InMemoryStockStore, InventoryChangeType, SnapshotLedger, StoreError,
};
use thiserror::Error;

pub use config::Config;

#[derive(Debug, Error)]
pub enum StressError {
    #[error("Engine error: {0}")]
    Engine(#[from] InventoryError),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] StoreError),

    #[error("Worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Outcome of a stress run.
#[derive(Debug, Clone)]
pub struct StressReport {
    pub initial_units: u64,
    pub succeeded: u64,
    /// Failed reservations keyed by error code.
    pub failed: BTreeMap<&'static str, u64>,
    pub remaining_available: u64,
    pub ledger_entries: u64,
    pub elapsed: Duration,
}

impl StressReport {
    /// True if every committed reservation is reflected in both stock and ledger.
    pub fn is_consistent(&self) -> bool {
        self.remaining_available + self.succeeded == self.initial_units
            && self.ledger_entries == self.succeeded
    }

    pub fn failed_total(&self) -> u64 {
        self.failed.values().sum()
    }
}

/// Runs `workers × iterations` single-unit reservations, worker `w` hitting
/// SKU `w mod skus`, and tallies the result.
#[tracing::instrument(
    skip(config),
    fields(workers = config.workers, iterations = config.iterations, skus = config.skus)
)]
pub async fn run(config: &Config) -> Result<StressReport, StressError> {
    let engine = Arc::new(InventoryEngine::new(
        InMemoryStockStore::new(),
        InMemoryLedger::new(),
        config.retry,
    ));

    let units = config.units_per_sku();
    let mut skus = Vec::with_capacity(config.skus as usize);
    for _ in 0..config.skus {
        let sku = SkuId::new();
        engine.register_sku(sku, units).await?;
        skus.push(sku);
    }
    let skus = Arc::new(skus);

    let started = Instant::now();
    let mut handles = Vec::with_capacity(config.workers as usize);
    for worker in 0..config.workers {
        let engine = engine.clone();
        let skus = skus.clone();
        let iterations = config.iterations;
        handles.push(tokio::spawn(async move {
            let sku = skus[worker as usize % skus.len()];
            let mut succeeded = 0u64;
            let mut failed: BTreeMap<&'static str, u64> = BTreeMap::new();
            for _ in 0..iterations {
                match engine
                    .adjust_single(sku, InventoryChangeType::Reserve, 1, ReferenceId::new())
                    .await
                {
                    Ok(_) => succeeded += 1,
                    Err(e) => {
                        tracing::warn!(worker, %sku, error = %e, "reservation failed");
                        *failed.entry(e.code()).or_default() += 1;
                    }
                }
            }
            (succeeded, failed)
        }));
    }

    let mut succeeded = 0;
    let mut failed: BTreeMap<&'static str, u64> = BTreeMap::new();
    for handle in handles {
        let (ok, errors) = handle.await?;
        succeeded += ok;
        for (code, count) in errors {
            *failed.entry(code).or_default() += count;
        }
    }
    let elapsed = started.elapsed();

    let mut remaining_available = 0;
    for sku in skus.iter() {
        remaining_available += u64::from(engine.stock_view(*sku).await?.stock_available);
    }

    let ledger_entries = engine
        .ledger()
        .stream_all()
        .await?
        .try_fold(0u64, |count, _| async move { Ok(count + 1) })
        .await?;

    let report = StressReport {
        initial_units: u64::from(units) * u64::from(config.skus),
        succeeded,
        failed,
        remaining_available,
        ledger_entries,
        elapsed,
    };
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed_total(),
        ?elapsed,
        "stress run finished"
    );
    Ok(report)
}

//! PostgreSQL integration tests
//!
//! These tests start a PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p stock-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use futures_util::TryStreamExt;
use sqlx::PgPool;
use stock_store::{
    InventoryChangeType, LedgerEntry, LedgerQuery, PostgresInventoryStore, ReferenceId, SkuId,
    SnapshotLedger, SnapshotLedgerExt, StockLevels, StockStore, StoreError, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresInventoryStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE inventory_ledger, sku_stock")
        .execute(&pool)
        .await
        .unwrap();

    PostgresInventoryStore::new(pool)
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn create_and_read_record() {
    let store = get_test_store().await;
    let sku = SkuId::new();

    let created = store.create(sku, 15).await.unwrap();
    assert_eq!(created.version, Version::first());
    assert_eq!(created.levels, StockLevels::fully_available(15));

    let read = store.read(sku).await.unwrap();
    assert_eq!(read.sku_id, sku);
    assert_eq!(read.stock_available(), 15);

    let duplicate = store.create(sku, 3).await;
    assert!(matches!(duplicate, Err(StoreError::DuplicateSku(_))));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn conditional_update_checks_version() {
    let store = get_test_store().await;
    let sku = SkuId::new();
    store.create(sku, 10).await.unwrap();

    let reserved = StockLevels {
        total: 10,
        available: 7,
    };
    let updated = store
        .conditional_update(sku, Version::first(), reserved)
        .await
        .unwrap();
    assert_eq!(updated.version, Version::new(2));
    assert_eq!(updated.levels, reserved);

    let stale = store
        .conditional_update(sku, Version::first(), StockLevels::fully_available(10))
        .await;
    match stale {
        Err(StoreError::VersionConflict { actual, .. }) => assert_eq!(actual, Version::new(2)),
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(store.read(sku).await.unwrap().levels, reserved);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn missing_sku_is_not_a_conflict() {
    let store = get_test_store().await;

    let read = store.read(SkuId::new()).await;
    assert!(matches!(read, Err(StoreError::SkuNotFound(_))));

    let update = store
        .conditional_update(SkuId::new(), Version::first(), StockLevels::fully_available(1))
        .await;
    assert!(matches!(update, Err(StoreError::SkuNotFound(_))));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn ledger_round_trip_and_filters() {
    let store = get_test_store().await;
    let sku = SkuId::new();
    let record = store.create(sku, 10).await.unwrap();
    let reference = ReferenceId::new();

    store
        .append_all(vec![
            LedgerEntry::record(&record, InventoryChangeType::Reserve, 2, reference),
            LedgerEntry::record(&record, InventoryChangeType::Release, 2, reference),
        ])
        .await
        .unwrap();
    store
        .append(LedgerEntry::record(
            &record,
            InventoryChangeType::Inbound,
            5,
            ReferenceId::new(),
        ))
        .await
        .unwrap();

    let all = store.entries_for_sku(sku).await.unwrap();
    assert_eq!(all.len(), 3);

    let batch = store.entries_for_reference(reference).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|e| e.reference_id == reference));

    let inbound = store
        .count(LedgerQuery::for_sku(sku).change_type(InventoryChangeType::Inbound))
        .await
        .unwrap();
    assert_eq!(inbound, 1);

    let page = store
        .query(LedgerQuery::for_sku(sku).limit(2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn stream_all_pages_through_the_whole_ledger() {
    let store = get_test_store().await;
    let sku = SkuId::new();
    let record = store.create(sku, 1).await.unwrap();
    let reference = ReferenceId::new();

    // More than two pages' worth, appended in version order.
    let entries: Vec<LedgerEntry> = (2..=1201)
        .map(|version| {
            let mut entry =
                LedgerEntry::record(&record, InventoryChangeType::Reserve, 1, reference);
            entry.resulting_version = Version::new(version);
            entry
        })
        .collect();
    store.append_all(entries).await.unwrap();

    let streamed: Vec<LedgerEntry> = store
        .stream_all()
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(streamed.len(), 1200);
    let versions: Vec<i64> = streamed
        .iter()
        .map(|e| e.resulting_version.as_i64())
        .collect();
    assert_eq!(versions, (2..=1201).collect::<Vec<i64>>());
}

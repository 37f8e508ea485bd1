use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    EntryId, InventoryChangeType, LedgerEntry, LedgerQuery, ReferenceId, Result, SkuId,
    SkuStockRecord, StockLevels, StoreError, Version,
    store::{LedgerStream, SnapshotLedger, StockStore, validate_entries_for_append, validate_levels},
};

const RECORD_COLUMNS: &str = "id, stock_total, stock_available, version, updated_at";

/// Rows fetched per round trip by `stream_all`.
const STREAM_PAGE_SIZE: i64 = 500;

const ENTRY_COLUMNS: &str = "id, sku_id, change_type, quantity, resulting_stock_available, \
     resulting_stock_total, resulting_version, reference_id, applied_at";

/// PostgreSQL-backed stock store and ledger.
///
/// Stock rows carry a `version` column; `conditional_update` only matches the
/// row while that column still holds the version the caller read.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn counter(row: &PgRow, column: &str) -> Result<u32> {
        let raw: i64 = row.try_get(column)?;
        u32::try_from(raw)
            .map_err(|_| StoreError::CorruptRow(format!("{column} out of range: {raw}")))
    }

    fn row_to_record(row: PgRow) -> Result<SkuStockRecord> {
        Ok(SkuStockRecord {
            sku_id: SkuId::from_uuid(row.try_get::<Uuid, _>("id")?),
            levels: StockLevels {
                total: Self::counter(&row, "stock_total")?,
                available: Self::counter(&row, "stock_available")?,
            },
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let change_type: String = row.try_get("change_type")?;
        let change_type = change_type
            .parse::<InventoryChangeType>()
            .map_err(StoreError::CorruptRow)?;

        Ok(LedgerEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sku_id: SkuId::from_uuid(row.try_get::<Uuid, _>("sku_id")?),
            change_type,
            quantity: Self::counter(&row, "quantity")?,
            resulting_stock_available: Self::counter(&row, "resulting_stock_available")?,
            resulting_stock_total: Self::counter(&row, "resulting_stock_total")?,
            resulting_version: Version::new(row.try_get("resulting_version")?),
            reference_id: ReferenceId::from_uuid(row.try_get::<Uuid, _>("reference_id")?),
            applied_at: row.try_get("applied_at")?,
        })
    }

    /// Fetches the next page of entries after `after_position`, in append
    /// order, with the position of the last row returned.
    async fn fetch_page(
        pool: &PgPool,
        after_position: i64,
    ) -> Result<(Vec<LedgerEntry>, Option<i64>)> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}, position FROM inventory_ledger \
             WHERE position > $1 ORDER BY position ASC LIMIT $2"
        ))
        .bind(after_position)
        .bind(STREAM_PAGE_SIZE)
        .fetch_all(pool)
        .await?;

        let last = match rows.last() {
            Some(row) => Some(row.try_get::<i64, _>("position")?),
            None => None,
        };
        let page = rows
            .into_iter()
            .map(Self::row_to_entry)
            .collect::<Result<Vec<_>>>()?;
        Ok((page, last))
    }

    /// Appends the WHERE clause for `query`, numbering parameters from `$1`.
    fn filter_sql(sql: &mut String, query: &LedgerQuery) -> usize {
        let mut param_count = 0;
        sql.push_str(" WHERE 1=1");

        if query.sku_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sku_id = ${param_count}"));
        }
        if query.reference_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND reference_id = ${param_count}"));
        }
        if query.change_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND change_type = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND applied_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND applied_at <= ${param_count}"));
        }

        param_count
    }

    /// Binds filter values in the order `filter_sql` numbered them.
    fn bind_filters<'q>(
        mut sqlx_query: Query<'q, Postgres, PgArguments>,
        query: &LedgerQuery,
    ) -> Query<'q, Postgres, PgArguments> {
        if let Some(sku_id) = query.sku_id {
            sqlx_query = sqlx_query.bind(sku_id.as_uuid());
        }
        if let Some(reference_id) = query.reference_id {
            sqlx_query = sqlx_query.bind(reference_id.as_uuid());
        }
        if let Some(ref change_types) = query.change_types {
            let names: Vec<String> = change_types
                .iter()
                .map(|c| c.as_str().to_string())
                .collect();
            sqlx_query = sqlx_query.bind(names);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        sqlx_query
    }
}

#[async_trait]
impl StockStore for PostgresInventoryStore {
    async fn create(&self, sku_id: SkuId, stock_total: u32) -> Result<SkuStockRecord> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            INSERT INTO sku_stock (id, stock_total, stock_available, version, updated_at)
            VALUES ($1, $2, $2, $3, NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(sku_id.as_uuid())
        .bind(i64::from(stock_total))
        .bind(Version::first().as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_record(row),
            None => Err(StoreError::DuplicateSku(sku_id)),
        }
    }

    async fn read(&self, sku_id: SkuId) -> Result<SkuStockRecord> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM sku_stock WHERE id = $1"
        ))
        .bind(sku_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_record(row),
            None => Err(StoreError::SkuNotFound(sku_id)),
        }
    }

    async fn conditional_update(
        &self,
        sku_id: SkuId,
        expected_version: Version,
        levels: StockLevels,
    ) -> Result<SkuStockRecord> {
        validate_levels(sku_id, &levels)?;

        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE sku_stock
            SET stock_total = $3, stock_available = $4, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(sku_id.as_uuid())
        .bind(expected_version.as_i64())
        .bind(i64::from(levels.total))
        .bind(i64::from(levels.available))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("stock_available_within_total")
            {
                return StoreError::InvalidLevels {
                    sku_id,
                    total: levels.total,
                    available: levels.available,
                };
            }
            StoreError::Database(e)
        })?;

        if let Some(row) = row {
            return Self::row_to_record(row);
        }

        // Nothing matched: either the row is gone or someone bumped the version.
        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM sku_stock WHERE id = $1")
            .bind(sku_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => Err(StoreError::VersionConflict {
                sku_id,
                expected: expected_version,
                actual: Version::new(actual),
            }),
            None => Err(StoreError::SkuNotFound(sku_id)),
        }
    }

    async fn list(&self) -> Result<Vec<SkuStockRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM sku_stock ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}

#[async_trait]
impl SnapshotLedger for PostgresInventoryStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        self.append_all(vec![entry]).await
    }

    async fn append_all(&self, entries: Vec<LedgerEntry>) -> Result<()> {
        validate_entries_for_append(&entries)?;

        let mut tx = self.pool.begin().await?;

        for entry in &entries {
            sqlx::query(&format!(
                r#"
                INSERT INTO inventory_ledger ({ENTRY_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#
            ))
            .bind(entry.entry_id.as_uuid())
            .bind(entry.sku_id.as_uuid())
            .bind(entry.change_type.as_str())
            .bind(i64::from(entry.quantity))
            .bind(i64::from(entry.resulting_stock_available))
            .bind(i64::from(entry.resulting_stock_total))
            .bind(entry.resulting_version.as_i64())
            .bind(entry.reference_id.as_uuid())
            .bind(entry.applied_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM inventory_ledger");
        let mut param_count = Self::filter_sql(&mut sql, &query);

        sql.push_str(" ORDER BY applied_at ASC, resulting_version ASC, position ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = Self::bind_filters(sqlx::query(&sql), &query);
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn count(&self, query: LedgerQuery) -> Result<usize> {
        let mut sql = String::from("SELECT COUNT(*) AS total FROM inventory_ledger");
        Self::filter_sql(&mut sql, &query);

        let row = Self::bind_filters(sqlx::query(&sql), &query)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(usize::try_from(total).unwrap_or(0))
    }

    async fn stream_all(&self) -> Result<LedgerStream> {
        use futures_util::{TryStreamExt, stream};

        // Pages are fetched lazily, one keyset query per page, so memory use
        // is bounded by the page size rather than the ledger size.
        let pages = stream::try_unfold(
            (self.pool.clone(), 0i64),
            |(pool, after_position)| async move {
                let fetched = Self::fetch_page(&pool, after_position).await;
                fetched.map(|(page, last)| last.map(|last| (page, (pool, last))))
            },
        );

        let entries = pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten();
        Ok(Box::pin(entries))
    }
}

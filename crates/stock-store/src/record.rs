use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SkuId;

/// Optimistic version token of a stock record.
///
/// A record is created at version 1 and every committed update
/// increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version a freshly created record carries.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The pair of counters tracked per SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    /// Total units owned.
    pub total: u32,
    /// Units not held by an active reservation.
    pub available: u32,
}

impl StockLevels {
    /// Creates levels with every owned unit available.
    pub fn fully_available(total: u32) -> Self {
        Self {
            total,
            available: total,
        }
    }

    /// Returns true if `available <= total`.
    pub fn is_consistent(&self) -> bool {
        self.available <= self.total
    }

    /// Units currently held by reservations.
    pub fn reserved(&self) -> u32 {
        self.total.saturating_sub(self.available)
    }
}

/// Stored stock state of one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuStockRecord {
    pub sku_id: SkuId,
    pub levels: StockLevels,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl SkuStockRecord {
    /// Creates a record at the first version with all units available.
    pub fn new(sku_id: SkuId, stock_total: u32) -> Self {
        Self {
            sku_id,
            levels: StockLevels::fully_available(stock_total),
            version: Version::first(),
            updated_at: Utc::now(),
        }
    }

    pub fn stock_total(&self) -> u32 {
        self.levels.total
    }

    pub fn stock_available(&self) -> u32 {
        self.levels.available
    }

    /// Returns the externally visible view of this record.
    pub fn view(&self) -> StockView {
        StockView {
            sku_id: self.sku_id,
            stock_total: self.levels.total,
            stock_available: self.levels.available,
        }
    }
}

/// Stock counters handed back to callers after a successful operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockView {
    pub sku_id: SkuId,
    pub stock_total: u32,
    pub stock_available: u32,
}

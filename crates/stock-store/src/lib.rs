pub mod change;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use change::{InventoryChangeType, StockRuleViolation};
pub use common::{ReferenceId, SkuId};
pub use error::{Result, StoreError};
pub use ledger::{EntryId, LedgerEntry};
pub use memory::{InMemoryLedger, InMemoryStockStore};
pub use postgres::PostgresInventoryStore;
pub use query::LedgerQuery;
pub use record::{SkuStockRecord, StockLevels, StockView, Version};
pub use store::{LedgerStream, SnapshotLedger, SnapshotLedgerExt, StockStore};

//! Inventory reservation engine.
//!
//! Mutates per-SKU stock counters under concurrent access without locks:
//! every change is a read, a pure transform and a version-checked write,
//! retried with linear backoff when another writer got there first.
//!
//! - [`RetryController`] wraps a single conditional update in a bounded retry loop
//! - [`InventoryEngine`] applies single adjustments and all-or-nothing batches,
//!   recording one ledger entry per applied change

pub mod config;
pub mod engine;
pub mod error;
pub mod retry;

pub use config::RetryConfig;
pub use engine::{BatchItem, InventoryEngine};
pub use error::{InventoryError, Result};
pub use retry::RetryController;

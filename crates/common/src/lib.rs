//! Identifier types shared across the inventory workspace.

pub mod types;

pub use types::{ReferenceId, SkuId};

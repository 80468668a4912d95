//! SQLite-backed storage for contractdesk.
//!
//! Exposes:
//! - SQLite schema creation/migration
//! - Sheet group records, including seqno changes that re-stamp referencing sheets
//! - Contract-sheet create, bulk create and update, all routed through
//!   [`contractdesk_sync::SequenceSyncEngine`]
//! - UoM normalization rules and [`contractdesk_sync::UomNormalizer`] snapshots
//!
//! [`Storage`] also implements the read-only lookup traits from
//! [`contractdesk_sync::lookup`], so it can back the sync components directly.

mod contract_sheets;
mod lookup;
mod schema;
pub mod storage;
mod uom_rules;

pub use storage::{Storage, StorageConfig, StorageError};

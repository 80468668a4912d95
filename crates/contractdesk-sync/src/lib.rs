//! Consistency rules applied to contract sheets before they reach storage.
//!
//! - [`SequenceSyncEngine`] stamps `sheetgroup_seqno` from the referenced sheet group on
//!   create, bulk create and update payloads.
//! - [`UomNormalizer`] rewrites raw unit spellings to canonical unit codes.
//!
//! Both are pure transforms over their inputs. Storage is reached only through the
//! traits in [`lookup`], so either component can be driven by SQLite, a remote
//! service, or plain in-memory collections in tests.

mod config;
mod error;
pub mod lookup;
mod sequence;
mod uom;

pub use config::SyncConfig;
pub use error::{BoxError, Result, SyncError};
pub use lookup::{
    ContractSheetLookup, InMemorySheetGroups, NormalizationRuleSource, SheetGroupLookup,
};
pub use sequence::SequenceSyncEngine;
pub use uom::UomNormalizer;

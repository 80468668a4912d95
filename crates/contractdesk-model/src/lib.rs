//! `contractdesk-model` defines the plain records shared by the contractdesk crates.
//!
//! Everything here is storage-agnostic and JSON-safe via `serde`:
//! - sheet groups and contract sheets (the records the sequence sync keeps consistent)
//! - UoM normalization rules and the key normalization they are indexed by
//! - [`ContractSheetPayload`], the field mapping accepted by every contract-sheet write path

mod contract_sheet;
mod ids;
mod payload;
mod sheet_group;
mod uom;

pub use contract_sheet::ContractSheet;
pub use ids::{ContractSheetId, RuleId, SheetGroupId};
pub use payload::{fields, ContractSheetPayload, PayloadError};
pub use sheet_group::{NewSheetGroup, SheetGroup};
pub use uom::{
    normalize_rule_language, normalize_uom_key, NewUomNormalizationRule, UomNormalizationRule,
};

use serde::{Deserialize, Serialize};

use crate::{ContractSheetId, SheetGroupId};

/// A persisted contract line item.
///
/// `sheetgroup_id` is a weak reference: the group may be missing (ungrouped or not
/// yet created) without the sheet being invalid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSheet {
    pub id: ContractSheetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheetgroup_id: Option<SheetGroupId>,
    /// Denormalized copy of the referenced group's seqno.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheetgroup_seqno: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_code: Option<String>,
}


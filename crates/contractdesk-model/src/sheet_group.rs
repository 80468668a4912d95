use serde::{Deserialize, Serialize};

use crate::SheetGroupId;

fn default_true() -> bool {
    true
}

/// A named, ordered category that contract sheets are tagged with.
///
/// `sheetgroup_seqno` is the source of truth for ordering; contract sheets keep a
/// denormalized copy that the sequence sync re-stamps on every write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetGroup {
    pub id: SheetGroupId,
    pub code: String,
    pub name: String,
    /// Categorical grouping kind (free-form, curated by operators).
    pub sheetgroup_type: String,
    pub sheetgroup_seqno: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Insert form of [`SheetGroup`]; the id is assigned by storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSheetGroup {
    pub code: String,
    pub name: String,
    pub sheetgroup_type: String,
    pub sheetgroup_seqno: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewSheetGroup {
    pub fn new(code: impl Into<String>, name: impl Into<String>, sheetgroup_seqno: i64) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            sheetgroup_type: String::new(),
            sheetgroup_seqno,
            is_active: true,
        }
    }

    pub fn into_sheet_group(self, id: SheetGroupId) -> SheetGroup {
        SheetGroup {
            id,
            code: self.code,
            name: self.name,
            sheetgroup_type: self.sheetgroup_type,
            sheetgroup_seqno: self.sheetgroup_seqno,
            is_active: self.is_active,
        }
    }
}

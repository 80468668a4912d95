use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::SheetGroupId;

/// Field names understood by the contract-sheet write paths.
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const CONTRACT_ID: &str = "contract_id";
    pub const SHEETGROUP_ID: &str = "sheetgroup_id";
    pub const SHEETGROUP_SEQNO: &str = "sheetgroup_seqno";
    pub const UOM_ID: &str = "uom_id";
    pub const UOM_CODE: &str = "uom_code";
    pub const SHEET_CODE: &str = "sheet_code";
}

/// A caller violated the payload contract (wrong container or field type).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("contract sheet payload must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("field `{field}` must be {expected}, got {found}")]
    InvalidField {
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Field mapping submitted to a contract-sheet write path.
///
/// Fields that are absent mean "not supplied"; for updates they are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractSheetPayload(Map<String, Value>);

impl ContractSheetPayload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style [`ContractSheetPayload::insert`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn sheetgroup_id(&self) -> Result<Option<SheetGroupId>, PayloadError> {
        Ok(self.integer_field(fields::SHEETGROUP_ID)?.map(SheetGroupId))
    }

    pub fn sheetgroup_seqno(&self) -> Result<Option<i64>, PayloadError> {
        self.integer_field(fields::SHEETGROUP_SEQNO)
    }

    pub fn set_sheetgroup_seqno(&mut self, seqno: i64) {
        self.insert(fields::SHEETGROUP_SEQNO, seqno);
    }

    /// Read an id-like field.
    ///
    /// `null`, a missing key and a blank string are all "absent". Integers and
    /// strings holding a base-10 integer (form input) are accepted.
    pub fn integer_field(&self, field: &str) -> Result<Option<i64>, PayloadError> {
        let invalid = |found: &Value| PayloadError::InvalidField {
            field: field.to_string(),
            expected: "an integer",
            found: describe(found).to_string(),
        };

        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value @ Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid(value)),
            Some(value @ Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<i64>().map(Some).map_err(|_| invalid(value))
            }
            Some(other) => Err(invalid(other)),
        }
    }

    /// Read a text field. `null` and a missing key are absent; other non-strings are rejected.
    pub fn text_field(&self, field: &str) -> Result<Option<&str>, PayloadError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(PayloadError::InvalidField {
                field: field.to_string(),
                expected: "a string",
                found: describe(other).to_string(),
            }),
        }
    }
}

impl TryFrom<Value> for ContractSheetPayload {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PayloadError::NotAnObject {
                found: describe(&other),
            }),
        }
    }
}

impl From<Map<String, Value>> for ContractSheetPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() => "an integer",
        Value::Number(n) if n.is_u64() => "an out-of-range integer",
        Value::Number(_) => "a fractional number",
        Value::String(_) => "a non-numeric string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Log unresolved `sheetgroup_id` references at `warn` instead of `debug`
    /// (default: true).
    pub warn_on_unresolved: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            warn_on_unresolved: true,
        }
    }
}

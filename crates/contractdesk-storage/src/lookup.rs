use std::collections::{BTreeMap, BTreeSet};

use contractdesk_model::{ContractSheetId, RuleId, SheetGroup, SheetGroupId, UomNormalizationRule};
use contractdesk_sync::{ContractSheetLookup, NormalizationRuleSource, SheetGroupLookup};
use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::{fetch_sheet_group, fetch_sheet_groups, Storage, StorageError};

/// Lookups on an already-held connection or transaction.
///
/// Contract-sheet writes resolve groups through this inside their own transaction, so
/// the stamped seqno and the written row come from the same database state.
pub(crate) struct ConnLookup<'c>(pub(crate) &'c Connection);

impl SheetGroupLookup for ConnLookup<'_> {
    type Error = rusqlite::Error;

    fn sheet_group_by_id(&self, id: SheetGroupId) -> rusqlite::Result<Option<SheetGroup>> {
        fetch_sheet_group(self.0, id)
    }

    fn sheet_groups_by_ids(
        &self,
        ids: &BTreeSet<SheetGroupId>,
    ) -> rusqlite::Result<BTreeMap<SheetGroupId, SheetGroup>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        Ok(fetch_sheet_groups(self.0, &raw)?
            .into_iter()
            .map(|group| (group.id, group))
            .collect())
    }
}

impl ContractSheetLookup for ConnLookup<'_> {
    type Error = rusqlite::Error;

    fn current_sheetgroup_id(
        &self,
        id: ContractSheetId,
    ) -> rusqlite::Result<Option<Option<SheetGroupId>>> {
        let row = self
            .0
            .query_row(
                "SELECT sheetgroup_id FROM contract_sheets WHERE id = ?1",
                params![id.get()],
                |r| r.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(row.map(|group| group.map(SheetGroupId)))
    }
}

impl SheetGroupLookup for Storage {
    type Error = StorageError;

    fn sheet_group_by_id(&self, id: SheetGroupId) -> Result<Option<SheetGroup>, StorageError> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        Ok(ConnLookup(&conn).sheet_group_by_id(id)?)
    }

    fn sheet_groups_by_ids(
        &self,
        ids: &BTreeSet<SheetGroupId>,
    ) -> Result<BTreeMap<SheetGroupId, SheetGroup>, StorageError> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        Ok(ConnLookup(&conn).sheet_groups_by_ids(ids)?)
    }
}

impl ContractSheetLookup for Storage {
    type Error = StorageError;

    fn current_sheetgroup_id(
        &self,
        id: ContractSheetId,
    ) -> Result<Option<Option<SheetGroupId>>, StorageError> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        Ok(ConnLookup(&conn).current_sheetgroup_id(id)?)
    }
}

impl NormalizationRuleSource for Storage {
    type Error = StorageError;

    /// `None` loads every rule; otherwise only rules of that language, with `Some("")`
    /// selecting unscoped rules as the unique index does. Insertion order (id ascending)
    /// decides duplicate-key tie-breaks.
    fn normalization_rules(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<UomNormalizationRule>, StorageError> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = match language {
            Some(_) => conn.prepare(
                r#"
                SELECT id, raw_uom_code, uom_code, language
                FROM uom_normalization_rules
                WHERE IFNULL(language, '') = ?1
                ORDER BY id
                "#,
            )?,
            None => conn.prepare(
                r#"
                SELECT id, raw_uom_code, uom_code, language
                FROM uom_normalization_rules
                ORDER BY id
                "#,
            )?,
        };
        let rows = match language {
            Some(language) => stmt.query_map(params![language], rule_from_row)?,
            None => stmt.query_map([], rule_from_row)?,
        };

        let mut rules = Vec::new();
        for rule in rows {
            rules.push(rule?);
        }
        Ok(rules)
    }
}

pub(crate) fn rule_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UomNormalizationRule> {
    Ok(UomNormalizationRule {
        id: RuleId(r.get(0)?),
        raw_uom_code: r.get(1)?,
        uom_code: r.get(2)?,
        language: r.get(3)?,
    })
}

use contractdesk_model::{
    fields, ContractSheet, ContractSheetId, ContractSheetPayload, PayloadError, SheetGroupId,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};

use crate::storage::{Result, Storage, StorageError};

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Integer,
    Text,
}

/// Writable contract-sheet columns, in insert order.
const WRITABLE_COLUMNS: [(&str, ColumnKind); 7] = [
    (fields::PROJECT_ID, ColumnKind::Integer),
    (fields::CONTRACT_ID, ColumnKind::Integer),
    (fields::SHEETGROUP_ID, ColumnKind::Integer),
    (fields::SHEETGROUP_SEQNO, ColumnKind::Integer),
    (fields::UOM_ID, ColumnKind::Integer),
    (fields::UOM_CODE, ColumnKind::Text),
    (fields::SHEET_CODE, ColumnKind::Text),
];

const CONTRACT_SHEET_COLUMNS: &str =
    "id, project_id, contract_id, sheetgroup_id, sheetgroup_seqno, uom_id, uom_code, sheet_code";

fn column_value(
    payload: &ContractSheetPayload,
    column: &str,
    kind: ColumnKind,
) -> std::result::Result<SqlValue, PayloadError> {
    Ok(match kind {
        ColumnKind::Integer => payload
            .integer_field(column)?
            .map_or(SqlValue::Null, SqlValue::Integer),
        ColumnKind::Text => payload
            .text_field(column)?
            .map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string())),
    })
}

/// Every writable column, absent fields as `NULL`.
fn insert_values(payload: &ContractSheetPayload) -> std::result::Result<Vec<SqlValue>, PayloadError> {
    WRITABLE_COLUMNS
        .iter()
        .map(|(column, kind)| column_value(payload, column, *kind))
        .collect()
}

/// Only the writable columns present in the payload.
fn patch_values(
    payload: &ContractSheetPayload,
) -> std::result::Result<Vec<(&'static str, SqlValue)>, PayloadError> {
    let mut out = Vec::new();
    for (column, kind) in WRITABLE_COLUMNS {
        if payload.contains(column) {
            out.push((column, column_value(payload, column, kind)?));
        }
    }
    Ok(out)
}

fn insert_row(conn: &Connection, values: Vec<SqlValue>) -> rusqlite::Result<ContractSheetId> {
    let columns: Vec<&str> = WRITABLE_COLUMNS.iter().map(|(column, _)| *column).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    conn.execute(
        &format!(
            "INSERT INTO contract_sheets ({}) VALUES ({placeholders})",
            columns.join(", ")
        ),
        params_from_iter(values),
    )?;
    Ok(ContractSheetId(conn.last_insert_rowid()))
}

fn contract_sheet_from_row(r: &Row<'_>) -> rusqlite::Result<ContractSheet> {
    Ok(ContractSheet {
        id: ContractSheetId(r.get(0)?),
        project_id: r.get(1)?,
        contract_id: r.get(2)?,
        sheetgroup_id: r.get::<_, Option<i64>>(3)?.map(SheetGroupId),
        sheetgroup_seqno: r.get(4)?,
        uom_id: r.get(5)?,
        uom_code: r.get(6)?,
        sheet_code: r.get(7)?,
    })
}

fn fetch_contract_sheet(
    conn: &Connection,
    id: ContractSheetId,
) -> rusqlite::Result<Option<ContractSheet>> {
    conn.query_row(
        &format!("SELECT {CONTRACT_SHEET_COLUMNS} FROM contract_sheets WHERE id = ?1"),
        params![id.get()],
        contract_sheet_from_row,
    )
    .optional()
}

impl Storage {
    /// Insert one contract sheet with its seqno stamped from the referenced group.
    ///
    /// The group is resolved inside the insert's transaction.
    pub fn create_contract_sheet(&self, payload: ContractSheetPayload) -> Result<ContractSheet> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let payload = self.sync_engine(&tx).prepare_single(payload)?;
        let id = insert_row(&tx, insert_values(&payload)?)?;
        let sheet = fetch_contract_sheet(&tx, id)?.ok_or(StorageError::ContractSheetNotFound(id))?;
        tx.commit()?;
        Ok(sheet)
    }

    /// Insert many contract sheets in one transaction, returned in input order.
    ///
    /// Referenced groups are resolved once for the whole batch, inside that transaction;
    /// a malformed payload rejects the batch without writing any row.
    pub fn bulk_create_contract_sheets(
        &self,
        payloads: Vec<ContractSheetPayload>,
    ) -> Result<Vec<ContractSheet>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let payloads = self.sync_engine(&tx).prepare_batch(payloads)?;
        let rows = payloads
            .iter()
            .map(insert_values)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut created = Vec::with_capacity(rows.len());
        for values in rows {
            let id = insert_row(&tx, values)?;
            created.push(fetch_contract_sheet(&tx, id)?.ok_or(StorageError::ContractSheetNotFound(id))?);
        }
        tx.commit()?;
        Ok(created)
    }

    /// Apply a partial update. Fields missing from the payload keep their stored value;
    /// the seqno is re-derived from the effective group (new or unchanged) within the
    /// update's transaction.
    pub fn update_contract_sheet(
        &self,
        id: ContractSheetId,
        payload: ContractSheetPayload,
    ) -> Result<ContractSheet> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let payload = self.sync_engine(&tx).prepare_update_stored(id, payload)?;
        let patch = patch_values(&payload)?;

        let assignments: Vec<String> = patch
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .chain(std::iter::once("updated_at = CURRENT_TIMESTAMP".to_string()))
            .collect();
        let mut values: Vec<SqlValue> = patch.into_iter().map(|(_, value)| value).collect();
        values.push(SqlValue::Integer(id.get()));

        let changed = tx.execute(
            &format!(
                "UPDATE contract_sheets SET {} WHERE id = ?",
                assignments.join(", ")
            ),
            params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(StorageError::ContractSheetNotFound(id));
        }
        let sheet = fetch_contract_sheet(&tx, id)?.ok_or(StorageError::ContractSheetNotFound(id))?;
        tx.commit()?;
        Ok(sheet)
    }

    pub fn get_contract_sheet(&self, id: ContractSheetId) -> Result<ContractSheet> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_contract_sheet(&conn, id)?.ok_or(StorageError::ContractSheetNotFound(id))
    }

    /// Sheets of one contract in display order: grouped sheets by seqno, then
    /// ungrouped ones, ties broken by id.
    pub fn list_contract_sheets(&self, contract_id: i64) -> Result<Vec<ContractSheet>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {CONTRACT_SHEET_COLUMNS}
            FROM contract_sheets
            WHERE contract_id = ?1
            ORDER BY sheetgroup_seqno IS NULL, sheetgroup_seqno, id
            "#
        ))?;
        let rows = stmt.query_map(params![contract_id], contract_sheet_from_row)?;

        let mut sheets = Vec::new();
        for sheet in rows {
            sheets.push(sheet?);
        }
        Ok(sheets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_only_contains_supplied_columns() {
        let payload = ContractSheetPayload::try_from(json!({
            "sheet_code": "B-2",
            "sheetgroup_id": null,
            "unknown": 1,
        }))
        .unwrap();

        let patch = patch_values(&payload).unwrap();

        assert_eq!(
            patch,
            vec![
                (fields::SHEETGROUP_ID, SqlValue::Null),
                (fields::SHEET_CODE, SqlValue::Text("B-2".to_string())),
            ]
        );
    }

    #[test]
    fn insert_values_cover_every_writable_column() {
        let payload = ContractSheetPayload::try_from(json!({ "uom_code": "PCS" })).unwrap();
        let values = insert_values(&payload).unwrap();
        assert_eq!(values.len(), WRITABLE_COLUMNS.len());
        assert_eq!(values[5], SqlValue::Text("PCS".to_string()));
        assert!(values[..5].iter().all(|v| *v == SqlValue::Null));
    }
}

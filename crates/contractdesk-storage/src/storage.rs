use crate::lookup::ConnLookup;
use crate::schema;
use contractdesk_model::{
    ContractSheetId, NewSheetGroup, PayloadError, RuleId, SheetGroup, SheetGroupId,
};
use contractdesk_sync::{SequenceSyncEngine, SyncConfig, SyncError};
use rusqlite::{
    params, Connection, OpenFlags, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("sheet group not found: {0}")]
    SheetGroupNotFound(SheetGroupId),
    #[error("contract sheet not found: {0}")]
    ContractSheetNotFound(ContractSheetId),
    #[error("uom normalization rule not found: {0}")]
    RuleNotFound(RuleId),
    #[error("uom normalization rule for {raw_uom_code:?} already exists (language: {language:?})")]
    DuplicateRule {
        raw_uom_code: String,
        language: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a writer waits on a locked database (default: 5s).
    pub busy_timeout: Duration,
    /// Settings for the sequence sync applied on contract-sheet writes.
    pub sync: SyncConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            sync: SyncConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) conn: Arc<Mutex<Connection>>,
    config: StorageConfig,
}

const SHEET_GROUP_COLUMNS: &str =
    "id, code, name, sheetgroup_type, sheetgroup_seqno, is_active";

impl Storage {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with_config(path, StorageConfig::default())
    }

    pub fn open_path_with_config(path: impl AsRef<Path>, config: StorageConfig) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, config)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_config(StorageConfig::default())
    }

    pub fn open_in_memory_with_config(config: StorageConfig) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    pub fn open_uri(uri: &str) -> Result<Self> {
        Self::open_uri_with_config(uri, StorageConfig::default())
    }

    pub fn open_uri_with_config(uri: &str, config: StorageConfig) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;
        Self::from_connection(Connection::open_with_flags(uri, flags)?, config)
    }

    fn from_connection(conn: Connection, config: StorageConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Sequence sync that reads through `conn`, normally the caller's open write
    /// transaction.
    pub(crate) fn sync_engine<'c>(
        &self,
        conn: &'c Connection,
    ) -> SequenceSyncEngine<ConnLookup<'c>> {
        SequenceSyncEngine::with_config(ConnLookup(conn), self.config.sync.clone())
    }

    pub fn create_sheet_group(&self, group: NewSheetGroup) -> Result<SheetGroup> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            r#"
            INSERT INTO sheet_groups (code, name, sheetgroup_type, sheetgroup_seqno, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                &group.code,
                &group.name,
                &group.sheetgroup_type,
                group.sheetgroup_seqno,
                group.is_active
            ],
        )?;
        let id = SheetGroupId(conn.last_insert_rowid());
        Ok(group.into_sheet_group(id))
    }

    pub fn get_sheet_group(&self, id: SheetGroupId) -> Result<SheetGroup> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        fetch_sheet_group(&conn, id)?.ok_or(StorageError::SheetGroupNotFound(id))
    }

    /// All sheet groups in display order (seqno, then id).
    pub fn list_sheet_groups(&self) -> Result<Vec<SheetGroup>> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHEET_GROUP_COLUMNS} FROM sheet_groups ORDER BY sheetgroup_seqno, id"
        ))?;
        let rows = stmt.query_map([], sheet_group_from_row)?;

        let mut groups = Vec::new();
        for group in rows {
            groups.push(group?);
        }
        Ok(groups)
    }

    /// Change a group's seqno and re-stamp every contract sheet that references it, in
    /// one transaction.
    pub fn set_sheet_group_seqno(&self, id: SheetGroupId, seqno: i64) -> Result<SheetGroup> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            r#"
            UPDATE sheet_groups
            SET sheetgroup_seqno = ?1, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?2
            "#,
            params![seqno, id.get()],
        )?;
        if changed == 0 {
            return Err(StorageError::SheetGroupNotFound(id));
        }
        let restamped = restamp_contract_sheets_tx(&tx, id, seqno)?;
        let group = fetch_sheet_group(&tx, id)?.ok_or(StorageError::SheetGroupNotFound(id))?;
        tx.commit()?;

        log::debug!("sheet group {id} moved to seqno {seqno}; re-stamped {restamped} contract sheets");
        Ok(group)
    }

    /// Re-stamp contract sheets of a group whose stored seqno drifted. Returns the number
    /// of rows changed.
    pub fn resync_contract_sheets(&self, id: SheetGroupId) -> Result<usize> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let group = fetch_sheet_group(&tx, id)?.ok_or(StorageError::SheetGroupNotFound(id))?;
        let restamped = restamp_contract_sheets_tx(&tx, id, group.sheetgroup_seqno)?;
        tx.commit()?;
        Ok(restamped)
    }
}

pub(crate) fn sheet_group_from_row(r: &Row<'_>) -> rusqlite::Result<SheetGroup> {
    Ok(SheetGroup {
        id: SheetGroupId(r.get(0)?),
        code: r.get(1)?,
        name: r.get(2)?,
        sheetgroup_type: r.get(3)?,
        sheetgroup_seqno: r.get(4)?,
        is_active: r.get(5)?,
    })
}

pub(crate) fn fetch_sheet_group(
    conn: &Connection,
    id: SheetGroupId,
) -> rusqlite::Result<Option<SheetGroup>> {
    conn.query_row(
        &format!("SELECT {SHEET_GROUP_COLUMNS} FROM sheet_groups WHERE id = ?1"),
        params![id.get()],
        sheet_group_from_row,
    )
    .optional()
}

/// SQLite's default bound-parameter limit is 999 on older builds.
const MAX_IN_PARAMS: usize = 900;

pub(crate) fn fetch_sheet_groups(
    conn: &Connection,
    ids: &[i64],
) -> rusqlite::Result<Vec<SheetGroup>> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_IN_PARAMS) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHEET_GROUP_COLUMNS} FROM sheet_groups WHERE id IN ({placeholders})"
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), sheet_group_from_row)?;
        for group in rows {
            out.push(group?);
        }
    }
    Ok(out)
}

fn restamp_contract_sheets_tx(
    tx: &Transaction<'_>,
    id: SheetGroupId,
    seqno: i64,
) -> rusqlite::Result<usize> {
    tx.execute(
        r#"
        UPDATE contract_sheets
        SET sheetgroup_seqno = ?1, updated_at = CURRENT_TIMESTAMP
        WHERE sheetgroup_id = ?2 AND sheetgroup_seqno IS NOT ?1
        "#,
        params![seqno, id.get()],
    )
}

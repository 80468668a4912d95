use contractdesk_model::normalize_uom_key;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

pub(crate) const SCHEMA_VERSION: i64 = 3;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          id INTEGER PRIMARY KEY CHECK (id = 1),
          version INTEGER NOT NULL
        );
        "#,
    )?;

    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| r.get(0))
        .optional()?
        .unwrap_or(0);
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    if version < 1 {
        create_base_tables(&tx)?;
    }
    if version < 2 {
        migrate_v2_contract_sheet_seqno(&tx)?;
    }
    if version < 3 {
        migrate_v3_unique_rule_keys(&tx)?;
    }
    tx.execute(
        r#"
        INSERT INTO schema_version (id, version) VALUES (1, ?1)
        ON CONFLICT(id) DO UPDATE SET version = excluded.version
        "#,
        params![SCHEMA_VERSION],
    )?;
    tx.commit()?;

    log::debug!("schema migrated from v{version} to v{SCHEMA_VERSION}");
    Ok(())
}

fn create_base_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sheet_groups (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          code TEXT NOT NULL,
          name TEXT NOT NULL,
          sheetgroup_type TEXT NOT NULL DEFAULT '',
          sheetgroup_seqno INTEGER NOT NULL DEFAULT 0,
          is_active INTEGER NOT NULL DEFAULT 1,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        -- `sheetgroup_id` is a weak reference: sheets may point at groups that do not
        -- exist yet, so there is no foreign key.
        CREATE TABLE IF NOT EXISTS contract_sheets (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id INTEGER,
          contract_id INTEGER,
          sheetgroup_id INTEGER,
          uom_id INTEGER,
          uom_code TEXT,
          sheet_code TEXT,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_contract_sheets_contract ON contract_sheets(contract_id);
        CREATE INDEX IF NOT EXISTS idx_contract_sheets_sheetgroup ON contract_sheets(sheetgroup_id);

        CREATE TABLE IF NOT EXISTS uom_normalization_rules (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          raw_uom_code TEXT NOT NULL,
          uom_code TEXT NOT NULL,
          language TEXT,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
}

/// v2: denormalized `sheetgroup_seqno` on contract sheets, backfilled from the groups.
fn migrate_v2_contract_sheet_seqno(conn: &Connection) -> rusqlite::Result<()> {
    let existing = table_columns(conn, "contract_sheets")?;
    if !existing.contains("sheetgroup_seqno") {
        conn.execute(
            "ALTER TABLE contract_sheets ADD COLUMN sheetgroup_seqno INTEGER",
            [],
        )?;
    }

    conn.execute(
        r#"
        UPDATE contract_sheets
        SET sheetgroup_seqno = (
          SELECT g.sheetgroup_seqno FROM sheet_groups g WHERE g.id = contract_sheets.sheetgroup_id
        )
        WHERE sheetgroup_id IN (SELECT id FROM sheet_groups)
        "#,
        [],
    )?;
    Ok(())
}

/// v3: rule keys are stored normalized and unique per language.
///
/// Older databases may hold unnormalized or duplicate keys. Keys are rewritten with
/// [`normalize_uom_key`] and, on collision, the rule with the highest id is kept,
/// matching the normalizer's last-rule-wins tie-break. Blank languages become `NULL`.
fn migrate_v3_unique_rule_keys(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE uom_normalization_rules SET language = NULL WHERE TRIM(language) = ''",
        [],
    )?;
    let mut stmt = conn.prepare(
        "SELECT id, raw_uom_code, language FROM uom_normalization_rules ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    let mut keep: HashMap<(String, String), i64> = HashMap::new();
    for (id, raw, language) in rows {
        let key = normalize_uom_key(&raw);
        let scope = (key.clone(), language.unwrap_or_default());
        if keep.contains_key(&scope) {
            conn.execute(
                "DELETE FROM uom_normalization_rules WHERE id = ?1",
                params![id],
            )?;
            log::warn!("dropped duplicate uom rule {id} for key {key:?}");
            continue;
        }
        keep.insert(scope, id);
        if key != raw {
            conn.execute(
                "UPDATE uom_normalization_rules SET raw_uom_code = ?1 WHERE id = ?2",
                params![key, id],
            )?;
        }
    }

    conn.execute_batch(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_uom_rules_key
          ON uom_normalization_rules(raw_uom_code, IFNULL(language, ''));
        "#,
    )?;
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = HashSet::new();
    for name in rows {
        existing.insert(name?);
    }
    Ok(existing)
}

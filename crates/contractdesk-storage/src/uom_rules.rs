use contractdesk_model::{
    normalize_rule_language, normalize_uom_key, NewUomNormalizationRule, RuleId,
    UomNormalizationRule,
};
use contractdesk_sync::UomNormalizer;
use rusqlite::{params, ErrorCode, OptionalExtension};

use crate::lookup::rule_from_row;
use crate::storage::{Result, Storage, StorageError};

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn duplicate_or(err: rusqlite::Error, rule: &NewUomNormalizationRule) -> StorageError {
    if is_unique_violation(&err) {
        StorageError::DuplicateRule {
            raw_uom_code: rule.raw_uom_code.clone(),
            language: rule.language.clone(),
        }
    } else {
        StorageError::Sqlite(err)
    }
}

/// Stored keys are always in lookup form and blank languages are stored as `NULL`,
/// whatever the caller passed.
fn normalized(mut rule: NewUomNormalizationRule) -> NewUomNormalizationRule {
    rule.raw_uom_code = normalize_uom_key(&rule.raw_uom_code);
    rule.language = normalize_rule_language(rule.language.as_deref());
    rule
}

impl Storage {
    pub fn create_uom_rule(&self, rule: NewUomNormalizationRule) -> Result<UomNormalizationRule> {
        let rule = normalized(rule);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.execute(
            r#"
            INSERT INTO uom_normalization_rules (raw_uom_code, uom_code, language)
            VALUES (?1, ?2, ?3)
            "#,
            params![&rule.raw_uom_code, &rule.uom_code, rule.language.as_deref()],
        )
        .map_err(|err| duplicate_or(err, &rule))?;
        let id = RuleId(conn.last_insert_rowid());
        Ok(rule.into_rule(id))
    }

    pub fn get_uom_rule(&self, id: RuleId) -> Result<UomNormalizationRule> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        conn.query_row(
            r#"
            SELECT id, raw_uom_code, uom_code, language
            FROM uom_normalization_rules
            WHERE id = ?1
            "#,
            params![id.get()],
            rule_from_row,
        )
        .optional()?
        .ok_or(StorageError::RuleNotFound(id))
    }

    pub fn update_uom_rule(
        &self,
        id: RuleId,
        rule: NewUomNormalizationRule,
    ) -> Result<UomNormalizationRule> {
        let rule = normalized(rule);
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let changed = conn
            .execute(
                r#"
                UPDATE uom_normalization_rules
                SET raw_uom_code = ?1, uom_code = ?2, language = ?3, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?4
                "#,
                params![
                    &rule.raw_uom_code,
                    &rule.uom_code,
                    rule.language.as_deref(),
                    id.get()
                ],
            )
            .map_err(|err| duplicate_or(err, &rule))?;
        if changed == 0 {
            return Err(StorageError::RuleNotFound(id));
        }
        Ok(rule.into_rule(id))
    }

    pub fn delete_uom_rule(&self, id: RuleId) -> Result<()> {
        let conn = self.conn.lock().expect("storage mutex poisoned");
        let changed = conn.execute(
            "DELETE FROM uom_normalization_rules WHERE id = ?1",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(StorageError::RuleNotFound(id));
        }
        Ok(())
    }

    /// Snapshot the rules of `language` (all rules for `None`, unscoped rules for
    /// `Some("")`) into a normalizer.
    pub fn uom_normalizer(&self, language: Option<&str>) -> Result<UomNormalizer> {
        Ok(UomNormalizer::from_source(self, language)?)
    }
}

use std::collections::HashMap;

use contractdesk_model::{
    fields, normalize_uom_key, ContractSheetPayload, PayloadError, UomNormalizationRule,
};

use crate::error::{Result, SyncError};
use crate::lookup::NormalizationRuleSource;

/// Resolves raw unit spellings to canonical unit codes.
///
/// Built from a rule snapshot; the normalizer never re-reads its source. Rules are
/// indexed by [`normalize_uom_key`] and on duplicate keys the later rule wins.
#[derive(Debug, Clone, Default)]
pub struct UomNormalizer {
    by_key: HashMap<String, String>,
}

impl UomNormalizer {
    pub fn new(rules: impl IntoIterator<Item = UomNormalizationRule>) -> Self {
        let mut by_key = HashMap::new();
        for rule in rules {
            let key = normalize_uom_key(&rule.raw_uom_code);
            if let Some(previous) = by_key.insert(key.clone(), rule.uom_code) {
                log::debug!(
                    "uom rule {} overrides earlier mapping to {previous:?} for key {key:?}",
                    rule.id
                );
            }
        }
        Self { by_key }
    }

    /// Load a rule snapshot for `language` and index it.
    pub fn from_source<S>(source: &S, language: Option<&str>) -> Result<Self>
    where
        S: NormalizationRuleSource + ?Sized,
    {
        let rules = source
            .normalization_rules(language)
            .map_err(|err| SyncError::lookup("normalization rule", err))?;
        Ok(Self::new(rules))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Canonical code for a raw spelling, if a rule matches.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.by_key.get(&normalize_uom_key(raw)).map(String::as_str)
    }

    /// Canonical code on a rule hit, otherwise the input with surrounding whitespace
    /// removed (case preserved). Empty input is returned as-is.
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        match self.lookup(raw) {
            Some(code) => code.to_string(),
            None => raw.trim().to_string(),
        }
    }

    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|raw| self.normalize(raw))
    }

    /// Rewrite the payload's `uom_code` in place of the raw spelling.
    pub fn normalize_payload(
        &self,
        mut payload: ContractSheetPayload,
    ) -> std::result::Result<ContractSheetPayload, PayloadError> {
        if let Some(raw) = payload.text_field(fields::UOM_CODE)? {
            let code = self.normalize(raw);
            payload.insert(fields::UOM_CODE, code);
        }
        Ok(payload)
    }
}

use serde::{Deserialize, Serialize};

use crate::RuleId;

/// Lookup key for a raw unit spelling: lower-cased, then trimmed.
///
/// Case folding is Unicode-aware for non-ASCII input (`"KÖRBE"` -> `"körbe"`).
pub fn normalize_uom_key(raw: &str) -> String {
    if raw.is_ascii() {
        raw.to_ascii_lowercase().trim().to_string()
    } else {
        raw.to_lowercase().trim().to_string()
    }
}

/// Language scope of a rule. A blank language is the same scope as no language.
pub fn normalize_rule_language(language: Option<&str>) -> Option<String> {
    language
        .filter(|language| !language.trim().is_empty())
        .map(str::to_string)
}

/// Maps one raw unit spelling to a canonical unit code within a language scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UomNormalizationRule {
    pub id: RuleId,
    /// Normalized lookup key (see [`normalize_uom_key`]).
    pub raw_uom_code: String,
    /// Canonical target code, stored verbatim.
    pub uom_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Insert form of [`UomNormalizationRule`].
///
/// The constructor normalizes `raw_uom_code` so stored keys are always in lookup form,
/// and folds a blank `language` into `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUomNormalizationRule {
    pub raw_uom_code: String,
    pub uom_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl NewUomNormalizationRule {
    pub fn new(raw_uom_code: &str, uom_code: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            raw_uom_code: normalize_uom_key(raw_uom_code),
            uom_code: uom_code.into(),
            language: normalize_rule_language(language),
        }
    }

    pub fn into_rule(self, id: RuleId) -> UomNormalizationRule {
        UomNormalizationRule {
            id,
            raw_uom_code: self.raw_uom_code,
            uom_code: self.uom_code,
            language: self.language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_trimmed_and_lowercased() {
        assert_eq!(normalize_uom_key("  PCS "), "pcs");
        assert_eq!(normalize_uom_key("\tKg\n"), "kg");
        assert_eq!(normalize_uom_key("KÖRBE"), "körbe");
        assert_eq!(normalize_uom_key(""), "");
        assert_eq!(normalize_uom_key("   "), "");
    }

    #[test]
    fn new_rule_stores_normalized_key_and_verbatim_target() {
        let rule = NewUomNormalizationRule::new(" Pieces ", "PCS", Some("en"));
        assert_eq!(rule.raw_uom_code, "pieces");
        assert_eq!(rule.uom_code, "PCS");
        assert_eq!(rule.language.as_deref(), Some("en"));
    }

    #[test]
    fn blank_language_is_unscoped() {
        assert_eq!(NewUomNormalizationRule::new("pcs", "PCS", Some("")).language, None);
        assert_eq!(NewUomNormalizationRule::new("pcs", "PCS", Some("  ")).language, None);
        assert_eq!(normalize_rule_language(Some("de")).as_deref(), Some("de"));
    }
}

//! Rule table loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{legacy, RuleError, RuleResult};
use crate::models::{ConceptLabel, PatientInput, Rule};

/// A versioned, read-only list of rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleTable {
    #[serde(default)]
    pub version: Option<String>,
    pub rules: Vec<Rule>,
}

/// Either a bare rule array or a versioned table object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleTableDocument<T> {
    Table {
        #[serde(default)]
        version: Option<String>,
        rules: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> RuleTableDocument<T> {
    fn into_parts(self) -> (Option<String>, Vec<T>) {
        match self {
            RuleTableDocument::Table { version, rules } => (version, rules),
            RuleTableDocument::Bare(rules) => (None, rules),
        }
    }
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { version: None, rules }
    }

    /// Parse a table in the per-axis schema.
    pub fn from_json(json: &str) -> RuleResult<Self> {
        let document: RuleTableDocument<Rule> = serde_json::from_str(json)?;
        let (version, rules) = document.into_parts();
        let table = Self { version, rules };
        table.validate()?;
        info!(rules = table.rules.len(), version = ?table.version, "Rule table loaded");
        Ok(table)
    }

    /// Parse a table in the legacy combined-tag schema.
    pub fn from_legacy_json(json: &str) -> RuleResult<Self> {
        let document: RuleTableDocument<legacy::LegacyRule> = serde_json::from_str(json)?;
        let (version, legacy_rules) = document.into_parts();
        let rules = legacy_rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.into_rule(index))
            .collect::<RuleResult<Vec<_>>>()?;
        let table = Self { version, rules };
        table.validate()?;
        info!(rules = table.rules.len(), version = ?table.version, "Legacy rule table translated");
        Ok(table)
    }

    /// Read a table from disk.
    pub fn from_path<P: AsRef<Path>>(path: P, legacy_format: bool) -> RuleResult<Self> {
        let json = std::fs::read_to_string(path)?;
        if legacy_format {
            Self::from_legacy_json(&json)
        } else {
            Self::from_json(&json)
        }
    }

    /// Serialize in the per-axis schema.
    pub fn to_json(&self) -> RuleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject band indices outside 1..=5.
    fn validate(&self) -> RuleResult<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            let bands = rule
                .conditions
                .age_band
                .iter()
                .chain(rule.conditions.axial_length_band.iter());
            for &band in bands {
                if !(1..=5).contains(&band) {
                    return Err(RuleError::InvalidBand { rule: index, band });
                }
            }
        }
        Ok(())
    }

    /// Evaluate the table for a patient.
    pub fn recommend(&self, input: &PatientInput) -> Vec<ConceptLabel> {
        super::recommend(input, &self.rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array() {
        let table = RuleTable::from_json(r#"[{"result": "A", "conditions": {"ageBand": [1, 2]}}]"#)
            .unwrap();
        assert_eq!(table.version, None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_versioned_object() {
        let table = RuleTable::from_json(r#"{"version": "2024-03", "rules": []}"#).unwrap();
        assert_eq!(table.version.as_deref(), Some("2024-03"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_band_rejected() {
        let result = RuleTable::from_json(r#"[{"result": "A", "conditions": {"axialLengthBand": [6]}}]"#);
        assert!(matches!(result, Err(RuleError::InvalidBand { rule: 0, band: 6 })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RuleTable::from_json("{not json"),
            Err(RuleError::JsonParse(_))
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let json = r#"[{"result": "A", "conditions": {"auxiliary": {"retinalRisk": ["extreme"]}}}]"#;
        assert!(RuleTable::from_json(json).is_err());
    }
}

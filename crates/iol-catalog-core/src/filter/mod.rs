//! Attribute filter engine.
//!
//! Stateless predicates over a materialized catalog. Criteria use the
//! sentinel `"all"` to disable a filter.

mod concepts;

pub use concepts::*;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{ConceptLabel, Lens};

/// Sentinel value meaning "no restriction".
pub const ALL: &str = "all";

/// Tri-state toric filter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToricFilter {
    #[default]
    All,
    Yes,
    No,
}

impl ToricFilter {
    pub fn matches(self, toric: bool) -> bool {
        match self {
            ToricFilter::All => true,
            ToricFilter::Yes => toric,
            ToricFilter::No => !toric,
        }
    }
}

/// Basic-mode filter criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Exact manufacturer name, or `"all"`
    pub manufacturer: String,
    /// Optic class (case-insensitive), or `"all"`
    pub optic_class: String,
    pub toric: ToricFilter,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            manufacturer: ALL.to_string(),
            optic_class: ALL.to_string(),
            toric: ToricFilter::All,
        }
    }
}

impl FilterCriteria {
    /// Select a clinical concept by label.
    ///
    /// `"all"` clears the optic class filter; a known concept sets it to the
    /// mapped optic class; anything else leaves it unchanged.
    pub fn select_clinical_concept(&mut self, label: &str) {
        if label.trim().eq_ignore_ascii_case(ALL) {
            self.optic_class = ALL.to_string();
            return;
        }
        if let Some(class) = optic_class_for_label(label) {
            self.optic_class = class.to_string();
        }
    }

    fn manufacturer_matches(&self, lens: &Lens) -> bool {
        self.manufacturer == ALL || lens.manufacturer == self.manufacturer
    }

    fn optic_class_matches(&self, lens: &Lens) -> bool {
        self.optic_class.eq_ignore_ascii_case(ALL) || lens.has_optic_concept(&self.optic_class)
    }

    /// Check a lens against all basic criteria.
    pub fn matches(&self, lens: &Lens) -> bool {
        self.manufacturer_matches(lens)
            && self.optic_class_matches(lens)
            && self.toric.matches(lens.specifications.toric)
    }
}

/// How the filter interprets the optic class.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "mode", content = "concepts")]
pub enum FilterMode {
    /// Optic class from the criteria
    #[default]
    Basic,
    /// Optic class from a set of recommended concepts; a lens passes when
    /// its class matches any mapped class. Unmapped labels are ignored.
    Recommended(Vec<ConceptLabel>),
}

/// Filter a catalog, preserving catalog order.
pub fn filter(lenses: &[Lens], mode: &FilterMode, criteria: &FilterCriteria) -> Vec<Lens> {
    let result: Vec<Lens> = match mode {
        FilterMode::Basic => lenses
            .iter()
            .filter(|lens| criteria.matches(lens))
            .cloned()
            .collect(),
        FilterMode::Recommended(labels) => {
            let classes: Vec<&str> = labels
                .iter()
                .filter_map(|label| optic_class_for_label(label.as_str()))
                .collect();
            lenses
                .iter()
                .filter(|lens| criteria.manufacturer_matches(lens))
                .filter(|lens| criteria.toric.matches(lens.specifications.toric))
                .filter(|lens| classes.iter().any(|class| lens.has_optic_concept(class)))
                .cloned()
                .collect()
        }
    };

    debug!(total = lenses.len(), matched = result.len(), ?mode, "Catalog filtered");
    result
}

/// Distinct manufacturers, sorted.
pub fn manufacturers(lenses: &[Lens]) -> Vec<String> {
    lenses
        .iter()
        .map(|l| l.manufacturer.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct optic classes (lowercased), sorted.
pub fn optic_classes(lenses: &[Lens]) -> Vec<String> {
    lenses
        .iter()
        .map(|l| l.specifications.optic_concept.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClinicalConcept;

    fn lens(id: &str, manufacturer: &str, concept: &str, toric: bool) -> Lens {
        let mut lens = Lens::new(id, manufacturer, format!("Lens {}", id));
        lens.specifications.optic_concept = concept.into();
        lens.specifications.toric = toric;
        lens
    }

    fn catalog() -> Vec<Lens> {
        vec![
            lens("1", "Alcon", "Monofocal", false),
            lens("2", "Alcon", "trifocal", true),
            lens("3", "Zeiss", "EDoF", false),
            lens("4", "Zeiss", "multifocal", true),
            lens("5", "Hoya", "monofocal", true),
        ]
    }

    fn ids(lenses: &[Lens]) -> Vec<&str> {
        lenses.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_default_criteria_match_everything() {
        let result = filter(&catalog(), &FilterMode::Basic, &FilterCriteria::default());
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn test_manufacturer_exact_match() {
        let criteria = FilterCriteria {
            manufacturer: "Zeiss".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&catalog(), &FilterMode::Basic, &criteria)), vec!["3", "4"]);

        let criteria = FilterCriteria {
            manufacturer: "zeiss".into(),
            ..Default::default()
        };
        assert!(filter(&catalog(), &FilterMode::Basic, &criteria).is_empty());
    }

    #[test]
    fn test_optic_class_case_insensitive() {
        let criteria = FilterCriteria {
            optic_class: "MONOFOCAL".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&catalog(), &FilterMode::Basic, &criteria)), vec!["1", "5"]);
    }

    #[test]
    fn test_toric_tri_state() {
        let mut criteria = FilterCriteria::default();
        criteria.toric = ToricFilter::Yes;
        assert_eq!(ids(&filter(&catalog(), &FilterMode::Basic, &criteria)), vec!["2", "4", "5"]);
        criteria.toric = ToricFilter::No;
        assert_eq!(ids(&filter(&catalog(), &FilterMode::Basic, &criteria)), vec!["1", "3"]);
    }

    #[test]
    fn test_select_clinical_concept() {
        let mut criteria = FilterCriteria::default();

        criteria.select_clinical_concept(ClinicalConcept::PartialExtend.label());
        assert_eq!(criteria.optic_class, "EDoF");
        assert_eq!(ids(&filter(&catalog(), &FilterMode::Basic, &criteria)), vec!["3"]);

        criteria.select_clinical_concept("Unknown concept");
        assert_eq!(criteria.optic_class, "EDoF");

        criteria.select_clinical_concept("all");
        assert_eq!(criteria.optic_class, ALL);
    }

    #[test]
    fn test_recommended_mode() {
        let mode = FilterMode::Recommended(vec![
            ClinicalConcept::PartialNarrow.into(),
            ClinicalConcept::FullContinuous.into(),
            ConceptLabel::from("Unmapped"),
        ]);
        let criteria = FilterCriteria {
            manufacturer: "Alcon".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter(&catalog(), &mode, &criteria)), vec!["1", "2"]);
    }

    #[test]
    fn test_distinct_listings() {
        assert_eq!(manufacturers(&catalog()), vec!["Alcon", "Hoya", "Zeiss"]);
        assert_eq!(
            optic_classes(&catalog()),
            vec!["edof", "monofocal", "multifocal", "trifocal"]
        );
    }
}

//! Clinical concept → optic class table.

use crate::models::ClinicalConcept;

impl ClinicalConcept {
    /// Canonical optic class filter value for this concept.
    pub fn optic_class(self) -> &'static str {
        match self {
            ClinicalConcept::PartialNarrow => "monofocal",
            ClinicalConcept::PartialEnhance => "monofocal-plus",
            ClinicalConcept::PartialExtend => "EDoF",
            ClinicalConcept::FullSteep => "bifocal",
            ClinicalConcept::FullSmooth => "multifocal",
            // Continuous-range multifocals are catalogued as trifocal.
            ClinicalConcept::FullContinuous => "trifocal",
        }
    }
}

/// Optic class for a concept label; `None` for unrecognized labels.
pub fn optic_class_for_label(label: &str) -> Option<&'static str> {
    ClinicalConcept::from_label(label).map(ClinicalConcept::optic_class)
}

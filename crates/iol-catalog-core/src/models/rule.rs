//! Clinical recommendation rule models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the patient's natural lens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LensStatus {
    Transparent,
    Presbyopic,
    Dysfunctional,
    Cataract,
}

impl LensStatus {
    pub const ALL: [LensStatus; 4] = [
        LensStatus::Transparent,
        LensStatus::Presbyopic,
        LensStatus::Dysfunctional,
        LensStatus::Cataract,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            LensStatus::Transparent => "transparent",
            LensStatus::Presbyopic => "presbyopic",
            LensStatus::Dysfunctional => "dysfunctional",
            LensStatus::Cataract => "cataract",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

/// The five independent auxiliary patient axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryAxis {
    RefractiveSurgery,
    UncorrectedAcuity,
    ContactLens,
    AnteriorChamber,
    RetinalRisk,
}

impl AuxiliaryAxis {
    pub const ALL: [AuxiliaryAxis; 5] = [
        AuxiliaryAxis::RefractiveSurgery,
        AuxiliaryAxis::UncorrectedAcuity,
        AuxiliaryAxis::ContactLens,
        AuxiliaryAxis::AnteriorChamber,
        AuxiliaryAxis::RetinalRisk,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            AuxiliaryAxis::RefractiveSurgery => "refractive_surgery",
            AuxiliaryAxis::UncorrectedAcuity => "uncorrected_acuity",
            AuxiliaryAxis::ContactLens => "contact_lens",
            AuxiliaryAxis::AnteriorChamber => "anterior_chamber",
            AuxiliaryAxis::RetinalRisk => "retinal_risk",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        Self::ALL.into_iter().find(|a| a.tag() == tag)
    }
}

/// A category on one auxiliary axis.
pub trait AxisCategory: Copy + PartialEq + Sized + 'static {
    const AXIS: AuxiliaryAxis;
    const ALL: &'static [Self];

    fn tag(self) -> &'static str;

    fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        Self::ALL.iter().copied().find(|c| c.tag() == tag)
    }
}

macro_rules! axis_category {
    (
        $(#[$meta:meta])*
        $name:ident, $axis:expr, { $($variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl AxisCategory for $name {
            const AXIS: AuxiliaryAxis = $axis;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }
    };
}

axis_category!(
    /// Prior corneal refractive surgery.
    RefractiveSurgery, AuxiliaryAxis::RefractiveSurgery, {
        NoPriorSurgery => "no_prior_surgery",
        MyopicLaser => "myopic_laser",
        HyperopicLaser => "hyperopic_laser",
        RadialKeratotomy => "radial_keratotomy",
    }
);

axis_category!(
    /// Uncorrected distance visual acuity class.
    UncorrectedAcuity, AuxiliaryAxis::UncorrectedAcuity, {
        Good => "good",
        Reduced => "reduced",
        Poor => "poor",
    }
);

axis_category!(
    /// Contact lens tolerance.
    ContactLensTolerance, AuxiliaryAxis::ContactLens, {
        Tolerates => "tolerates",
        DoesNotTolerate => "does_not_tolerate",
        NeverWorn => "never_worn",
    }
);

axis_category!(
    /// Anterior chamber depth class.
    AnteriorChamberDepth, AuxiliaryAxis::AnteriorChamber, {
        Shallow => "shallow",
        Normal => "normal",
        Deep => "deep",
    }
);

axis_category!(
    /// Retinal risk class.
    RetinalRisk, AuxiliaryAxis::RetinalRisk, {
        Low => "low",
        Moderate => "moderate",
        High => "high",
    }
);

/// A recommendation label produced by a rule.
///
/// Rule tables are authored externally, so labels are free text; the six
/// well-known labels are available through [`ClinicalConcept`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConceptLabel(pub String);

impl ConceptLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ClinicalConcept> for ConceptLabel {
    fn from(concept: ClinicalConcept) -> Self {
        Self(concept.label().to_string())
    }
}

/// Patient-facing range-of-field concepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClinicalConcept {
    PartialNarrow,
    PartialEnhance,
    PartialExtend,
    FullSteep,
    FullSmooth,
    FullContinuous,
}

impl ClinicalConcept {
    pub const ALL: [ClinicalConcept; 6] = [
        ClinicalConcept::PartialNarrow,
        ClinicalConcept::PartialEnhance,
        ClinicalConcept::PartialExtend,
        ClinicalConcept::FullSteep,
        ClinicalConcept::FullSmooth,
        ClinicalConcept::FullContinuous,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ClinicalConcept::PartialNarrow => "Partial Range of Field – Narrow",
            ClinicalConcept::PartialEnhance => "Partial Range of Field – Enhance",
            ClinicalConcept::PartialExtend => "Partial Range of Field – Extend",
            ClinicalConcept::FullSteep => "Full Range of Field – Steep",
            ClinicalConcept::FullSmooth => "Full Range of Field – Smooth",
            ClinicalConcept::FullContinuous => "Full Range of Field – Continuous",
        }
    }

    /// Look up a concept by label. Hyphen and en-dash separators are both
    /// accepted, comparison ignores case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = canonical_label(label);
        Self::ALL
            .into_iter()
            .find(|c| canonical_label(c.label()) == wanted)
    }
}

fn canonical_label(label: &str) -> String {
    label
        .replace(['–', '—'], "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Per-axis allow-lists. An empty list leaves the axis unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryConditions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refractive_surgery: Vec<RefractiveSurgery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncorrected_acuity: Vec<UncorrectedAcuity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_lens: Vec<ContactLensTolerance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anterior_chamber: Vec<AnteriorChamberDepth>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retinal_risk: Vec<RetinalRisk>,
}

impl AuxiliaryConditions {
    /// Check whether the rule constrains the given axis.
    pub fn constrains(&self, axis: AuxiliaryAxis) -> bool {
        match axis {
            AuxiliaryAxis::RefractiveSurgery => !self.refractive_surgery.is_empty(),
            AuxiliaryAxis::UncorrectedAcuity => !self.uncorrected_acuity.is_empty(),
            AuxiliaryAxis::ContactLens => !self.contact_lens.is_empty(),
            AuxiliaryAxis::AnteriorChamber => !self.anterior_chamber.is_empty(),
            AuxiliaryAxis::RetinalRisk => !self.retinal_risk.is_empty(),
        }
    }
}

/// Restrictions a rule places on a patient. Empty lists are unrestricted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditions {
    /// Allowed age bands (1..=5)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub age_band: Vec<u8>,
    /// Allowed axial length bands (1..=5)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub axial_length_band: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lens_status: Vec<LensStatus>,
    #[serde(default)]
    pub auxiliary: AuxiliaryConditions,
}

/// A declarative recommendation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub result: ConceptLabel,
    #[serde(default)]
    pub conditions: RuleConditions,
}

impl Rule {
    pub fn new(result: impl Into<ConceptLabel>, conditions: RuleConditions) -> Self {
        Self {
            result: result.into(),
            conditions,
        }
    }
}

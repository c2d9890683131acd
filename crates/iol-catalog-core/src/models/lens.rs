//! Intraocular lens catalog models.

use serde::{Deserialize, Serialize};

/// A single intraocular lens model from the manufacturer catalog.
///
/// Values are produced fresh on every catalog parse and never mutated in
/// place. Overrides produce a new merged value (see [`crate::overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lens {
    /// Catalog identifier - unique per lens model
    pub id: String,
    /// Manufacturer name (e.g., "Alcon", "Zeiss")
    pub manufacturer: String,
    /// Commercial lens name
    pub name: String,
    /// Free-text note from the catalog
    pub note: Option<String>,
    pub specifications: Specifications,
    pub availability: Availability,
    pub constants: Constants,
}

/// Material, mechanical and optical attributes of a lens.
///
/// Numeric fields absent from the source are `None`, never `0.0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Specifications {
    pub optic_material: String,
    pub haptic_material: String,
    /// Recommended incision width in mm
    pub incision_width: Option<f64>,
    pub refractive_index: Option<f64>,
    pub abbe_number: Option<f64>,
    /// Optic diameter in mm
    pub optic_diameter: Option<f64>,
    /// Overall haptic diameter in mm
    pub haptic_diameter: Option<f64>,
    /// Optic design class (e.g., "monofocal", "EDoF", "trifocal")
    pub optic_concept: String,
    pub haptic_design: String,
    /// Spherical aberration correction (e.g., "neutral", "-0.20")
    pub spherical_aberration: String,
    pub toric: bool,
    /// Optional technology tag (e.g., "diffractive")
    pub technology: Option<String>,
}

/// A contiguous interval of manufactured refractive power.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SphereRange {
    pub from: f64,
    pub to: f64,
    /// Manufacturing step in diopters
    pub increment: Option<f64>,
}

/// Available powers for a lens.
///
/// The sphere aggregates are derived from `sphere_ranges` on every call and
/// are never stored, so they cannot drift from their source ranges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Sub-ranges in document order; may overlap
    pub sphere_ranges: Vec<SphereRange>,
    /// Near/intermediate add powers in diopters
    pub additions: Vec<f64>,
}

impl Availability {
    /// Lowest `from` over all ranges, or `0.0` without ranges.
    pub fn min_sphere(&self) -> f64 {
        if self.sphere_ranges.is_empty() {
            return 0.0;
        }
        self.sphere_ranges
            .iter()
            .map(|r| r.from)
            .fold(f64::INFINITY, f64::min)
    }

    /// Highest `to` over all ranges, or `0.0` without ranges.
    pub fn max_sphere(&self) -> f64 {
        if self.sphere_ranges.is_empty() {
            return 0.0;
        }
        self.sphere_ranges
            .iter()
            .map(|r| r.to)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Span between `min_sphere` and `max_sphere`.
    pub fn total_diopter_range(&self) -> f64 {
        self.max_sphere() - self.min_sphere()
    }

    /// Check whether a power falls inside any sphere range.
    pub fn covers(&self, power: f64) -> bool {
        self.sphere_ranges
            .iter()
            .any(|r| power >= r.from && power <= r.to)
    }
}

/// Biometry formula families carried in the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FormulaFamily {
    Ultrasound,
    SrkT,
    HofferQ,
    Holladay1,
    Barrett,
    Haigis,
}

impl FormulaFamily {
    pub const ALL: [FormulaFamily; 6] = [
        FormulaFamily::Ultrasound,
        FormulaFamily::SrkT,
        FormulaFamily::HofferQ,
        FormulaFamily::Holladay1,
        FormulaFamily::Barrett,
        FormulaFamily::Haigis,
    ];

    /// Coefficients belonging to this family.
    pub fn coefficients(self) -> &'static [Coefficient] {
        match self {
            FormulaFamily::Ultrasound => &[Coefficient::Ultrasound],
            FormulaFamily::SrkT => &[Coefficient::SrkT],
            FormulaFamily::HofferQ => &[Coefficient::HofferQ],
            FormulaFamily::Holladay1 => &[Coefficient::Holladay1],
            FormulaFamily::Barrett => &[Coefficient::Barrett],
            FormulaFamily::Haigis => &[
                Coefficient::HaigisA0,
                Coefficient::HaigisA1,
                Coefficient::HaigisA2,
            ],
        }
    }

    /// Display name used by the host.
    pub fn label(self) -> &'static str {
        match self {
            FormulaFamily::Ultrasound => "Ultrasound",
            FormulaFamily::SrkT => "SRK/T",
            FormulaFamily::HofferQ => "Hoffer Q",
            FormulaFamily::Holladay1 => "Holladay 1",
            FormulaFamily::Barrett => "Barrett",
            FormulaFamily::Haigis => "Haigis",
        }
    }
}

/// A single formula coefficient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Coefficient {
    /// Ultrasound A-constant
    Ultrasound,
    /// SRK/T A-constant
    SrkT,
    /// Hoffer Q pACD
    HofferQ,
    /// Holladay 1 surgeon factor
    Holladay1,
    /// Barrett lens factor
    Barrett,
    HaigisA0,
    HaigisA1,
    HaigisA2,
}

impl Coefficient {
    pub const ALL: [Coefficient; 8] = [
        Coefficient::Ultrasound,
        Coefficient::SrkT,
        Coefficient::HofferQ,
        Coefficient::Holladay1,
        Coefficient::Barrett,
        Coefficient::HaigisA0,
        Coefficient::HaigisA1,
        Coefficient::HaigisA2,
    ];

    /// Stable key, matching the serialized form.
    pub fn key(self) -> &'static str {
        match self {
            Coefficient::Ultrasound => "ultrasound",
            Coefficient::SrkT => "srk_t",
            Coefficient::HofferQ => "hoffer_q",
            Coefficient::Holladay1 => "holladay1",
            Coefficient::Barrett => "barrett",
            Coefficient::HaigisA0 => "haigis_a0",
            Coefficient::HaigisA1 => "haigis_a1",
            Coefficient::HaigisA2 => "haigis_a2",
        }
    }

    pub fn family(self) -> FormulaFamily {
        match self {
            Coefficient::Ultrasound => FormulaFamily::Ultrasound,
            Coefficient::SrkT => FormulaFamily::SrkT,
            Coefficient::HofferQ => FormulaFamily::HofferQ,
            Coefficient::Holladay1 => FormulaFamily::Holladay1,
            Coefficient::Barrett => FormulaFamily::Barrett,
            Coefficient::HaigisA0 | Coefficient::HaigisA1 | Coefficient::HaigisA2 => {
                FormulaFamily::Haigis
            }
        }
    }
}

/// One bundle of biometry constants (nominal or optimized).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstantValues {
    pub ultrasound: Option<f64>,
    pub srkt: Option<f64>,
    pub hoffer_q: Option<f64>,
    pub holladay1: Option<f64>,
    pub barrett: Option<f64>,
    pub haigis_a0: Option<f64>,
    pub haigis_a1: Option<f64>,
    pub haigis_a2: Option<f64>,
}

impl ConstantValues {
    /// Get the value of a coefficient.
    pub fn get(&self, coefficient: Coefficient) -> Option<f64> {
        match coefficient {
            Coefficient::Ultrasound => self.ultrasound,
            Coefficient::SrkT => self.srkt,
            Coefficient::HofferQ => self.hoffer_q,
            Coefficient::Holladay1 => self.holladay1,
            Coefficient::Barrett => self.barrett,
            Coefficient::HaigisA0 => self.haigis_a0,
            Coefficient::HaigisA1 => self.haigis_a1,
            Coefficient::HaigisA2 => self.haigis_a2,
        }
    }

    /// Mutable slot for a coefficient.
    pub fn slot_mut(&mut self, coefficient: Coefficient) -> &mut Option<f64> {
        match coefficient {
            Coefficient::Ultrasound => &mut self.ultrasound,
            Coefficient::SrkT => &mut self.srkt,
            Coefficient::HofferQ => &mut self.hoffer_q,
            Coefficient::Holladay1 => &mut self.holladay1,
            Coefficient::Barrett => &mut self.barrett,
            Coefficient::HaigisA0 => &mut self.haigis_a0,
            Coefficient::HaigisA1 => &mut self.haigis_a1,
            Coefficient::HaigisA2 => &mut self.haigis_a2,
        }
    }

    /// Check if any coefficient of a family carries a value.
    pub fn has_family(&self, family: FormulaFamily) -> bool {
        family.coefficients().iter().any(|c| self.get(*c).is_some())
    }

    pub fn is_empty(&self) -> bool {
        Coefficient::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

/// Published (`source`) and refined (`optimized`) constants.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Constants {
    pub source: ConstantValues,
    pub optimized: ConstantValues,
}

impl Constants {
    /// A family is present iff either bundle has a value for it.
    pub fn is_present(&self, family: FormulaFamily) -> bool {
        self.source.has_family(family) || self.optimized.has_family(family)
    }

    /// Families present for this lens, in canonical order.
    pub fn present_families(&self) -> Vec<FormulaFamily> {
        FormulaFamily::ALL
            .into_iter()
            .filter(|f| self.is_present(*f))
            .collect()
    }

    /// Optimized value if available, otherwise the published one.
    pub fn effective(&self, coefficient: Coefficient) -> Option<f64> {
        self.optimized
            .get(coefficient)
            .or_else(|| self.source.get(coefficient))
    }
}

impl Lens {
    /// Create a lens with required identity fields and empty sections.
    pub fn new(id: impl Into<String>, manufacturer: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            manufacturer: manufacturer.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Compare the optic design class, ignoring case and treating `-`, `_`
    /// and whitespace runs as one separator ("Monofocal Plus" == "monofocal-plus").
    pub fn has_optic_concept(&self, concept: &str) -> bool {
        optic_key(&self.specifications.optic_concept) == optic_key(concept)
    }
}

fn optic_key(value: &str) -> String {
    value
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficient_key_matches_serde() {
        for coefficient in Coefficient::ALL {
            let json = serde_json::to_string(&coefficient).unwrap();
            assert_eq!(json, format!("\"{}\"", coefficient.key()));
        }
    }

    fn range(from: f64, to: f64) -> SphereRange {
        SphereRange {
            from,
            to,
            increment: None,
        }
    }

    #[test]
    fn test_empty_availability_aggregates_are_zero() {
        let availability = Availability::default();
        assert_eq!(availability.min_sphere(), 0.0);
        assert_eq!(availability.max_sphere(), 0.0);
        assert_eq!(availability.total_diopter_range(), 0.0);
    }

    #[test]
    fn test_aggregates_over_overlapping_ranges() {
        let availability = Availability {
            sphere_ranges: vec![range(10.0, 30.0), range(-10.0, 9.0), range(5.0, 12.0)],
            additions: vec![],
        };
        assert_eq!(availability.min_sphere(), -10.0);
        assert_eq!(availability.max_sphere(), 30.0);
        assert_eq!(availability.total_diopter_range(), 40.0);
    }

    #[test]
    fn test_single_positive_range_min_is_not_zero() {
        let availability = Availability {
            sphere_ranges: vec![range(6.0, 34.0)],
            additions: vec![],
        };
        assert_eq!(availability.min_sphere(), 6.0);
        assert_eq!(availability.total_diopter_range(), 28.0);
    }

    #[test]
    fn test_covers() {
        let availability = Availability {
            sphere_ranges: vec![range(-10.0, 9.0), range(10.0, 30.0)],
            additions: vec![],
        };
        assert!(availability.covers(-10.0));
        assert!(availability.covers(21.5));
        assert!(!availability.covers(9.5));
        assert!(!availability.covers(31.0));
    }

    #[test]
    fn test_family_presence_from_either_bundle() {
        let mut constants = Constants::default();
        constants.source.srkt = Some(119.0);
        constants.optimized.haigis_a1 = Some(0.4);

        assert!(constants.is_present(FormulaFamily::SrkT));
        assert!(constants.is_present(FormulaFamily::Haigis));
        assert!(!constants.is_present(FormulaFamily::Barrett));
        assert_eq!(
            constants.present_families(),
            vec![FormulaFamily::SrkT, FormulaFamily::Haigis]
        );
    }

    #[test]
    fn test_effective_prefers_optimized() {
        let mut constants = Constants::default();
        constants.source.srkt = Some(118.7);
        constants.optimized.srkt = Some(119.1);
        constants.source.hoffer_q = Some(5.6);

        assert_eq!(constants.effective(Coefficient::SrkT), Some(119.1));
        assert_eq!(constants.effective(Coefficient::HofferQ), Some(5.6));
        assert_eq!(constants.effective(Coefficient::Barrett), None);
    }

    #[test]
    fn test_optic_concept_case_insensitive() {
        let mut lens = Lens::new("1", "Zeiss", "AT LISA tri");
        lens.specifications.optic_concept = "Trifocal".into();
        assert!(lens.has_optic_concept("trifocal"));
        assert!(!lens.has_optic_concept("bifocal"));
    }

    #[test]
    fn test_optic_concept_separator_insensitive() {
        let mut lens = Lens::new("1", "Johnson & Johnson", "Eyhance");
        for written in ["monofocal plus", "Monofocal-Plus", "monofocal_plus", " monofocal  plus "] {
            lens.specifications.optic_concept = written.into();
            assert!(lens.has_optic_concept("monofocal-plus"), "{written:?}");
        }
        assert!(!lens.has_optic_concept("monofocal"));
    }
}

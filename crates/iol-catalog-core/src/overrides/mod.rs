//! Non-destructive override layer.
//!
//! Overrides are sparse patches keyed by lens id. They are applied at read
//! time by producing new lens values; the base catalog is never written.

mod patch;

pub use patch::*;

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{Availability, ConstantValues, Constants, Lens, Specifications};

/// Lens id → patch.
pub type OverrideMap = BTreeMap<String, LensPatch>;

/// Deep merge of a patch into one record type.
///
/// Nested records merge recursively; every other field set in the patch
/// replaces the base value, arrays included.
pub trait Patch<T> {
    fn apply_to(&self, base: &mut T);
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

impl Patch<Lens> for LensPatch {
    fn apply_to(&self, base: &mut Lens) {
        set(&mut base.manufacturer, &self.manufacturer);
        set(&mut base.name, &self.name);
        set(&mut base.note, &self.note);
        if let Some(p) = &self.specifications {
            p.apply_to(&mut base.specifications);
        }
        if let Some(p) = &self.availability {
            p.apply_to(&mut base.availability);
        }
        if let Some(p) = &self.constants {
            p.apply_to(&mut base.constants);
        }
    }
}

impl Patch<Specifications> for SpecificationsPatch {
    fn apply_to(&self, base: &mut Specifications) {
        set(&mut base.optic_material, &self.optic_material);
        set(&mut base.haptic_material, &self.haptic_material);
        set(&mut base.incision_width, &self.incision_width);
        set(&mut base.refractive_index, &self.refractive_index);
        set(&mut base.abbe_number, &self.abbe_number);
        set(&mut base.optic_diameter, &self.optic_diameter);
        set(&mut base.haptic_diameter, &self.haptic_diameter);
        set(&mut base.optic_concept, &self.optic_concept);
        set(&mut base.haptic_design, &self.haptic_design);
        set(&mut base.spherical_aberration, &self.spherical_aberration);
        set(&mut base.toric, &self.toric);
        set(&mut base.technology, &self.technology);
    }
}

impl Patch<Availability> for AvailabilityPatch {
    fn apply_to(&self, base: &mut Availability) {
        set(&mut base.sphere_ranges, &self.sphere_ranges);
        set(&mut base.additions, &self.additions);
    }
}

impl Patch<Constants> for ConstantsPatch {
    fn apply_to(&self, base: &mut Constants) {
        if let Some(p) = &self.source {
            p.apply_to(&mut base.source);
        }
        if let Some(p) = &self.optimized {
            p.apply_to(&mut base.optimized);
        }
    }
}

impl Patch<ConstantValues> for ConstantValuesPatch {
    fn apply_to(&self, base: &mut ConstantValues) {
        set(&mut base.ultrasound, &self.ultrasound);
        set(&mut base.srkt, &self.srkt);
        set(&mut base.hoffer_q, &self.hoffer_q);
        set(&mut base.holladay1, &self.holladay1);
        set(&mut base.barrett, &self.barrett);
        set(&mut base.haigis_a0, &self.haigis_a0);
        set(&mut base.haigis_a1, &self.haigis_a1);
        set(&mut base.haigis_a2, &self.haigis_a2);
    }
}

/// Apply one patch, returning a new lens.
pub fn merge_lens(base: &Lens, patch: &LensPatch) -> Lens {
    let mut merged = base.clone();
    patch.apply_to(&mut merged);
    merged
}

/// Produce the merged view of a catalog.
///
/// Lenses without an entry are returned unchanged. Entries for ids that are
/// not in the catalog are ignored.
pub fn merge(base: &[Lens], overrides: &OverrideMap) -> Vec<Lens> {
    if overrides.is_empty() {
        return base.to_vec();
    }

    let mut applied = 0usize;
    let merged: Vec<Lens> = base
        .iter()
        .map(|lens| match overrides.get(&lens.id) {
            Some(patch) => {
                applied += 1;
                merge_lens(lens, patch)
            }
            None => lens.clone(),
        })
        .collect();

    debug!(
        overrides = overrides.len(),
        applied, "Applied lens overrides"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SphereRange;

    fn base_lens(id: &str) -> Lens {
        let mut lens = Lens::new(id, "Alcon", "Clareon");
        lens.specifications.optic_material = "hydrophobic acrylic".into();
        lens.specifications.refractive_index = Some(1.55);
        lens.specifications.optic_concept = "monofocal".into();
        lens.availability.sphere_ranges = vec![SphereRange {
            from: 6.0,
            to: 30.0,
            increment: Some(0.5),
        }];
        lens.constants.source.srkt = Some(119.1);
        lens
    }

    #[test]
    fn test_empty_overrides_is_noop() {
        let base = vec![base_lens("1"), base_lens("2")];
        assert_eq!(merge(&base, &OverrideMap::new()), base);
    }

    #[test]
    fn test_leaf_override_keeps_siblings() {
        let base = vec![base_lens("2299")];
        let mut overrides = OverrideMap::new();
        overrides.insert("2299".into(), LensPatch::toric(true));

        let merged = merge(&base, &overrides);

        assert!(merged[0].specifications.toric);
        let mut expected = base[0].specifications.clone();
        expected.toric = true;
        assert_eq!(merged[0].specifications, expected);
        assert_eq!(merged[0].availability, base[0].availability);
        assert!(!base[0].specifications.toric);
    }

    #[test]
    fn test_arrays_replaced_wholesale_and_aggregates_follow() {
        let base = vec![base_lens("1")];
        let mut overrides = OverrideMap::new();
        overrides.insert(
            "1".into(),
            LensPatch {
                availability: Some(AvailabilityPatch {
                    sphere_ranges: Some(vec![SphereRange {
                        from: -5.0,
                        to: 5.0,
                        increment: None,
                    }]),
                    additions: None,
                }),
                ..Default::default()
            },
        );

        let merged = merge(&base, &overrides);
        assert_eq!(merged[0].availability.sphere_ranges.len(), 1);
        assert_eq!(merged[0].availability.min_sphere(), -5.0);
        assert_eq!(merged[0].availability.total_diopter_range(), 10.0);
    }

    #[test]
    fn test_explicit_null_clears_value() {
        let base = vec![base_lens("1")];
        let patch: LensPatch =
            serde_json::from_str(r#"{"specifications": {"refractiveIndex": null}}"#).unwrap();
        let mut overrides = OverrideMap::new();
        overrides.insert("1".into(), patch);

        let merged = merge(&base, &overrides);
        assert_eq!(merged[0].specifications.refractive_index, None);
        assert_eq!(merged[0].specifications.optic_material, "hydrophobic acrylic");
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let base = vec![base_lens("1")];
        let mut overrides = OverrideMap::new();
        overrides.insert("missing".into(), LensPatch::toric(true));
        assert_eq!(merge(&base, &overrides), base);
    }

    #[test]
    fn test_nested_constants_merge() {
        let base = vec![base_lens("1")];
        let patch: LensPatch =
            serde_json::from_str(r#"{"constants": {"optimized": {"srkt": 119.4}}}"#).unwrap();
        let mut overrides = OverrideMap::new();
        overrides.insert("1".into(), patch);

        let merged = merge(&base, &overrides);
        assert_eq!(merged[0].constants.source.srkt, Some(119.1));
        assert_eq!(merged[0].constants.optimized.srkt, Some(119.4));
    }
}

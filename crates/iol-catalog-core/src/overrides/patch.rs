//! Sparse lens patches.
//!
//! Each patch mirrors one record type of the lens model with every field
//! optional. A field left out of the patch keeps the base value. For
//! nullable base fields an explicit JSON `null` clears the value, which is
//! why those fields are `Option<Option<T>>`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::SphereRange;

/// Distinguish an absent key (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Patch for a whole lens. The id is the map key and cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LensPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<SpecificationsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants: Option<ConstantsPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optic_material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptic_material: Option<String>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub incision_width: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub refractive_index: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub abbe_number: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub optic_diameter: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub haptic_diameter: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optic_concept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptic_design: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spherical_aberration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toric: Option<bool>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub technology: Option<Option<String>>,
}

/// Arrays are replaced wholesale, never merged element-wise.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_ranges: Option<Vec<SphereRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstantsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ConstantValuesPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<ConstantValuesPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstantValuesPatch {
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub ultrasound: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub srkt: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub hoffer_q: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub holladay1: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub barrett: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub haigis_a0: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub haigis_a1: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null", skip_serializing_if = "Option::is_none")]
    pub haigis_a2: Option<Option<f64>>,
}

impl LensPatch {
    /// Check if the patch sets nothing at all.
    pub fn is_empty(&self) -> bool {
        self == &LensPatch::default()
    }

    /// Convenience patch that only sets the toric flag.
    pub fn toric(toric: bool) -> Self {
        Self {
            specifications: Some(SpecificationsPatch {
                toric: Some(toric),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_null_are_distinct() {
        let patch: SpecificationsPatch =
            serde_json::from_str(r#"{"abbeNumber": null, "toric": true}"#).unwrap();

        assert_eq!(patch.abbe_number, Some(None));
        assert_eq!(patch.refractive_index, None);
        assert_eq!(patch.toric, Some(true));
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let json = serde_json::to_string(&LensPatch::toric(true)).unwrap();
        assert_eq!(json, r#"{"specifications":{"toric":true}}"#);
    }

    #[test]
    fn test_explicit_null_round_trips() {
        let patch = LensPatch {
            note: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"note":null}"#);

        let back: LensPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_empty_patch() {
        let patch: LensPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
        assert!(!LensPatch::toric(false).is_empty());
    }
}

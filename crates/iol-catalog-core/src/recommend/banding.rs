//! Classification of continuous patient measurements into bands.

use serde::{Deserialize, Serialize};

use crate::models::{AuxiliaryInput, LensStatus, PatientInput};

/// Interval bound.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Closed(f64),
    Open(f64),
}

/// One band: lower and upper bound plus its index.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    lower: Bound,
    upper: f64,
    index: u8,
}

impl Band {
    fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Bound::Closed(l) => value >= l,
            Bound::Open(l) => value > l,
        };
        above && value <= self.upper
    }
}

/// Age bands in years; closed intervals.
const AGE_BANDS: [Band; 5] = [
    Band { lower: Bound::Closed(35.0), upper: 44.0, index: 1 },
    Band { lower: Bound::Closed(45.0), upper: 54.0, index: 2 },
    Band { lower: Bound::Closed(55.0), upper: 64.0, index: 3 },
    Band { lower: Bound::Closed(65.0), upper: 74.0, index: 4 },
    Band { lower: Bound::Closed(75.0), upper: 85.0, index: 5 },
];

/// Axial length bands in mm; first closed, the rest left-open.
const AXIAL_LENGTH_BANDS: [Band; 5] = [
    Band { lower: Bound::Closed(14.0), upper: 18.5, index: 1 },
    Band { lower: Bound::Open(18.5), upper: 22.0, index: 2 },
    Band { lower: Bound::Open(22.0), upper: 24.5, index: 3 },
    Band { lower: Bound::Open(24.5), upper: 29.0, index: 4 },
    Band { lower: Bound::Open(29.0), upper: 35.0, index: 5 },
];

fn classify(bands: &[Band], value: Option<f64>) -> Option<u8> {
    let value = value?;
    bands.iter().find(|b| b.contains(value)).map(|b| b.index)
}

/// Age band (1..=5), `None` when absent or outside every band.
pub fn age_band(age_years: Option<f64>) -> Option<u8> {
    classify(&AGE_BANDS, age_years)
}

/// Axial length band (1..=5), `None` when absent or outside every band.
pub fn axial_length_band(axial_length_mm: Option<f64>) -> Option<u8> {
    classify(&AXIAL_LENGTH_BANDS, axial_length_mm)
}

/// A patient reduced to the discrete values rules are matched against.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub age_band: Option<u8>,
    pub axial_length_band: Option<u8>,
    pub lens_status: Option<LensStatus>,
    pub auxiliary: AuxiliaryInput,
}

impl PatientProfile {
    pub fn from_input(input: &PatientInput) -> Self {
        Self {
            age_band: age_band(input.age_years()),
            axial_length_band: axial_length_band(input.axial_length_mm()),
            lens_status: input.lens_status,
            auxiliary: input.auxiliary.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_band_boundaries() {
        assert_eq!(age_band(Some(34.9)), None);
        assert_eq!(age_band(Some(35.0)), Some(1));
        assert_eq!(age_band(Some(44.0)), Some(1));
        assert_eq!(age_band(Some(44.5)), None);
        assert_eq!(age_band(Some(45.0)), Some(2));
        assert_eq!(age_band(Some(58.0)), Some(3));
        assert_eq!(age_band(Some(74.0)), Some(4));
        assert_eq!(age_band(Some(85.0)), Some(5));
        assert_eq!(age_band(Some(86.0)), None);
        assert_eq!(age_band(None), None);
    }

    #[test]
    fn test_axial_length_band_boundaries() {
        assert_eq!(axial_length_band(Some(13.9)), None);
        assert_eq!(axial_length_band(Some(14.0)), Some(1));
        assert_eq!(axial_length_band(Some(18.5)), Some(1));
        assert_eq!(axial_length_band(Some(18.51)), Some(2));
        assert_eq!(axial_length_band(Some(22.0)), Some(2));
        assert_eq!(axial_length_band(Some(23.0)), Some(3));
        assert_eq!(axial_length_band(Some(24.5)), Some(3));
        assert_eq!(axial_length_band(Some(29.0)), Some(4));
        assert_eq!(axial_length_band(Some(35.0)), Some(5));
        assert_eq!(axial_length_band(Some(40.0)), None);
    }

    #[test]
    fn test_profile_from_raw_input() {
        let input = PatientInput::new().with_age("58").with_axial_length("not a number");
        let profile = PatientProfile::from_input(&input);

        assert_eq!(profile.age_band, Some(3));
        assert_eq!(profile.axial_length_band, None);
        assert_eq!(profile.lens_status, None);
    }
}

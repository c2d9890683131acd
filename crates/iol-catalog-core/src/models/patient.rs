//! Transient patient parameters for a single recommendation query.

use serde::{Deserialize, Serialize};

use super::rule::{
    AnteriorChamberDepth, ContactLensTolerance, LensStatus, RefractiveSurgery, RetinalRisk,
    UncorrectedAcuity,
};

/// Auxiliary categorical inputs. `None` means "unspecified".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryInput {
    pub refractive_surgery: Option<RefractiveSurgery>,
    pub uncorrected_acuity: Option<UncorrectedAcuity>,
    pub contact_lens: Option<ContactLensTolerance>,
    pub anterior_chamber: Option<AnteriorChamberDepth>,
    pub retinal_risk: Option<RetinalRisk>,
}

/// Patient parameters as entered by the user.
///
/// Measurements are kept as raw text; parsing happens during banding so that
/// an empty or non-numeric entry simply yields no band.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    /// Age in years
    #[serde(default)]
    pub age: String,
    /// Axial eye length in mm
    #[serde(default)]
    pub axial_length: String,
    /// `None` means "unspecified"
    #[serde(default)]
    pub lens_status: Option<LensStatus>,
    #[serde(default)]
    pub auxiliary: AuxiliaryInput,
}

impl PatientInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_age(mut self, age: impl Into<String>) -> Self {
        self.age = age.into();
        self
    }

    pub fn with_axial_length(mut self, axial_length: impl Into<String>) -> Self {
        self.axial_length = axial_length.into();
        self
    }

    pub fn with_lens_status(mut self, status: LensStatus) -> Self {
        self.lens_status = Some(status);
        self
    }

    pub fn with_auxiliary(mut self, auxiliary: AuxiliaryInput) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    /// Parsed age, `None` when empty or not a finite number.
    pub fn age_years(&self) -> Option<f64> {
        parse_measurement(&self.age)
    }

    /// Parsed axial length, `None` when empty or not a finite number.
    pub fn axial_length_mm(&self) -> Option<f64> {
        parse_measurement(&self.axial_length)
    }
}

/// Parse a user-entered measurement. Accepts a decimal comma.
pub fn parse_measurement(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measurement() {
        assert_eq!(parse_measurement("58"), Some(58.0));
        assert_eq!(parse_measurement(" 23.5 "), Some(23.5));
        assert_eq!(parse_measurement("23,5"), Some(23.5));
        assert_eq!(parse_measurement(""), None);
        assert_eq!(parse_measurement("abc"), None);
        assert_eq!(parse_measurement("NaN"), None);
        assert_eq!(parse_measurement("inf"), None);
    }

    #[test]
    fn test_builder() {
        let input = PatientInput::new()
            .with_age("70")
            .with_axial_length("24")
            .with_lens_status(LensStatus::Cataract);

        assert_eq!(input.age_years(), Some(70.0));
        assert_eq!(input.axial_length_mm(), Some(24.0));
        assert_eq!(input.lens_status, Some(LensStatus::Cataract));
        assert_eq!(input.auxiliary, AuxiliaryInput::default());
    }

    #[test]
    fn test_missing_measurements_deserialize_as_blank() {
        let input: PatientInput = serde_json::from_str(r#"{"lensStatus": "cataract"}"#).unwrap();
        assert_eq!(input.age, "");
        assert_eq!(input.axial_length, "");
        assert_eq!(input.age_years(), None);
        assert_eq!(input.axial_length_mm(), None);
        assert_eq!(input.lens_status, Some(LensStatus::Cataract));

        let input: PatientInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input, PatientInput::default());
    }
}

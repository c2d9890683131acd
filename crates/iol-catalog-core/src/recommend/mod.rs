//! Clinical recommendation rule engine.
//!
//! Pipeline: PatientInput → banding → PatientProfile → rule matching → labels
//!
//! Matching is an AND over every clause of a rule:
//! - age / axial length band: a restricted rule needs a band in its set
//! - lens status: only checked when the patient supplied one
//! - auxiliary axes: symmetric, a patient value needs the rule to allow it
//!   and an unspecified patient value needs the rule to be silent

mod banding;
mod legacy;
mod table;

pub use banding::*;
pub use legacy::*;
pub use table::*;

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::models::{AuxiliaryAxis, AuxiliaryConditions, AuxiliaryInput, ConceptLabel, PatientInput, Rule};

/// Rule table errors.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rule #{rule}: unknown condition tag {tag:?}")]
    UnknownTag { rule: usize, tag: String },

    #[error("Rule #{rule}: band {band} outside 1..=5")]
    InvalidBand { rule: usize, band: u8 },

    #[error("Rule #{rule}: tags leave no allowed category on axis {axis}")]
    EmptyAxis { rule: usize, axis: &'static str },
}

pub type RuleResult<T> = Result<T, RuleError>;

/// Check a band clause. An unrestricted rule always passes; a restricted
/// rule fails for a patient without a band.
fn band_matches(patient: Option<u8>, allowed: &[u8]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    patient.is_some_and(|band| allowed.contains(&band))
}

/// Symmetric auxiliary clause.
fn axis_matches<T: PartialEq>(patient: Option<&T>, allowed: &[T]) -> bool {
    match patient {
        Some(value) => allowed.contains(value),
        None => allowed.is_empty(),
    }
}

/// First auxiliary axis the patient fails, if any.
fn rejected_axis(patient: &AuxiliaryInput, rule: &AuxiliaryConditions) -> Option<AuxiliaryAxis> {
    let checks = [
        (
            AuxiliaryAxis::RefractiveSurgery,
            axis_matches(patient.refractive_surgery.as_ref(), &rule.refractive_surgery),
        ),
        (
            AuxiliaryAxis::UncorrectedAcuity,
            axis_matches(patient.uncorrected_acuity.as_ref(), &rule.uncorrected_acuity),
        ),
        (
            AuxiliaryAxis::ContactLens,
            axis_matches(patient.contact_lens.as_ref(), &rule.contact_lens),
        ),
        (
            AuxiliaryAxis::AnteriorChamber,
            axis_matches(patient.anterior_chamber.as_ref(), &rule.anterior_chamber),
        ),
        (
            AuxiliaryAxis::RetinalRisk,
            axis_matches(patient.retinal_risk.as_ref(), &rule.retinal_risk),
        ),
    ];
    checks
        .into_iter()
        .find(|(_, passed)| !passed)
        .map(|(axis, _)| axis)
}

/// Check a single rule against a classified patient.
pub fn rule_matches(profile: &PatientProfile, rule: &Rule) -> bool {
    let conditions = &rule.conditions;

    if !band_matches(profile.age_band, &conditions.age_band) {
        debug!(result = %rule.result, band = ?profile.age_band, "Rule rejected on age band");
        return false;
    }

    if !band_matches(profile.axial_length_band, &conditions.axial_length_band) {
        debug!(result = %rule.result, band = ?profile.axial_length_band, "Rule rejected on axial length band");
        return false;
    }

    if let Some(status) = profile.lens_status {
        if !conditions.lens_status.is_empty() && !conditions.lens_status.contains(&status) {
            debug!(result = %rule.result, ?status, "Rule rejected on lens status");
            return false;
        }
    }

    if let Some(axis) = rejected_axis(&profile.auxiliary, &conditions.auxiliary) {
        debug!(result = %rule.result, ?axis, "Rule rejected on auxiliary axis");
        return false;
    }

    true
}

/// Indices of all rules matching the patient, in table order.
pub fn evaluate(input: &PatientInput, rules: &[Rule]) -> Vec<usize> {
    let profile = PatientProfile::from_input(input);
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule_matches(&profile, rule))
        .map(|(index, _)| index)
        .collect()
}

/// Distinct labels of all matching rules, in first-seen table order.
pub fn recommend(input: &PatientInput, rules: &[Rule]) -> Vec<ConceptLabel> {
    let mut seen = HashSet::new();
    let labels: Vec<ConceptLabel> = evaluate(input, rules)
        .into_iter()
        .map(|index| &rules[index].result)
        .filter(|label| seen.insert(*label))
        .cloned()
        .collect();

    debug!(labels = labels.len(), rules = rules.len(), "Recommendation evaluated");
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnteriorChamberDepth, ContactLensTolerance, LensStatus, RetinalRisk, RuleConditions,
    };

    fn rule(result: &str, age: &[u8], axial: &[u8]) -> Rule {
        Rule::new(
            result,
            RuleConditions {
                age_band: age.to_vec(),
                axial_length_band: axial.to_vec(),
                ..Default::default()
            },
        )
    }

    fn patient(age: &str, axial: &str) -> PatientInput {
        PatientInput::new().with_age(age).with_axial_length(axial)
    }

    #[test]
    fn test_band_match() {
        let rules = vec![rule("A", &[3], &[2])];
        assert_eq!(recommend(&patient("58", "21.0"), &rules), vec![ConceptLabel::from("A")]);
    }

    #[test]
    fn test_out_of_band_patient_fails_restricted_rule() {
        let rules = vec![rule("A", &[3], &[2])];
        assert!(recommend(&patient("58", "40"), &rules).is_empty());
        assert!(recommend(&patient("", "21.0"), &rules).is_empty());
    }

    #[test]
    fn test_unrestricted_rule_matches_without_bands() {
        let rules = vec![rule("Any", &[], &[])];
        assert_eq!(recommend(&PatientInput::new(), &rules).len(), 1);
    }

    #[test]
    fn test_lens_status_optional_for_patient() {
        let mut r = rule("Cataract only", &[], &[]);
        r.conditions.lens_status = vec![LensStatus::Cataract];
        let rules = vec![r];

        assert_eq!(recommend(&PatientInput::new(), &rules).len(), 1);
        assert_eq!(
            recommend(&PatientInput::new().with_lens_status(LensStatus::Cataract), &rules).len(),
            1
        );
        assert!(recommend(&PatientInput::new().with_lens_status(LensStatus::Presbyopic), &rules)
            .is_empty());
    }

    #[test]
    fn test_patient_axis_requires_rule_to_list_it() {
        let rules = vec![rule("Silent", &[3], &[2])];
        let input = patient("58", "21.0").with_auxiliary(AuxiliaryInput {
            contact_lens: Some(ContactLensTolerance::DoesNotTolerate),
            ..Default::default()
        });
        assert!(recommend(&input, &rules).is_empty());
    }

    #[test]
    fn test_rule_axis_requires_patient_value() {
        let mut r = rule("Shallow AC", &[], &[]);
        r.conditions.auxiliary.anterior_chamber = vec![AnteriorChamberDepth::Shallow];
        let rules = vec![r];

        assert!(recommend(&PatientInput::new(), &rules).is_empty());

        let matching = PatientInput::new().with_auxiliary(AuxiliaryInput {
            anterior_chamber: Some(AnteriorChamberDepth::Shallow),
            ..Default::default()
        });
        assert_eq!(recommend(&matching, &rules).len(), 1);

        let other = PatientInput::new().with_auxiliary(AuxiliaryInput {
            anterior_chamber: Some(AnteriorChamberDepth::Deep),
            ..Default::default()
        });
        assert!(recommend(&other, &rules).is_empty());
    }

    #[test]
    fn test_deduplicates_in_first_seen_order() {
        let rules = vec![
            rule("Zeta", &[], &[]),
            rule("Alpha", &[], &[]),
            rule("Zeta", &[], &[]),
            rule("Never", &[1], &[]),
        ];
        let labels = recommend(&PatientInput::new(), &rules);
        assert_eq!(labels, vec![ConceptLabel::from("Zeta"), ConceptLabel::from("Alpha")]);
        assert_eq!(evaluate(&PatientInput::new(), &rules), vec![0, 1, 2]);
    }

    #[test]
    fn test_multiple_axes_all_must_pass() {
        let mut r = rule("Both", &[], &[]);
        r.conditions.auxiliary.retinal_risk = vec![RetinalRisk::Low, RetinalRisk::Moderate];
        r.conditions.auxiliary.contact_lens = vec![ContactLensTolerance::Tolerates];
        let rules = vec![r];

        let only_one = PatientInput::new().with_auxiliary(AuxiliaryInput {
            retinal_risk: Some(RetinalRisk::Low),
            ..Default::default()
        });
        assert!(recommend(&only_one, &rules).is_empty());

        let both = PatientInput::new().with_auxiliary(AuxiliaryInput {
            retinal_risk: Some(RetinalRisk::Moderate),
            contact_lens: Some(ContactLensTolerance::Tolerates),
            ..Default::default()
        });
        assert_eq!(recommend(&both, &rules).len(), 1);
    }
}

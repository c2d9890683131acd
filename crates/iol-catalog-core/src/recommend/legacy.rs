//! Adapter for rule tables in the legacy combined-tag schema.
//!
//! Legacy rules carry a single tag list mixing required (`axis:category`)
//! and negated (`!axis:category`) auxiliary conditions. Each axis is
//! translated into an allow-list:
//! - required tags only → exactly those categories
//! - negated tags only → every category except the negated ones
//! - both → required minus negated
//!
//! The translated rule is then matched with the symmetric per-axis semantics,
//! so a negated tag no longer admits patients who left the axis unspecified.

use serde::Deserialize;

use super::{RuleError, RuleResult};
use crate::models::{
    AnteriorChamberDepth, AuxiliaryAxis, AuxiliaryConditions, AxisCategory, ConceptLabel,
    ContactLensTolerance, LensStatus, RefractiveSurgery, RetinalRisk, Rule, RuleConditions,
    UncorrectedAcuity,
};

/// Lens status restriction: a list, or the literal `"all"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyLensStatus {
    Keyword(String),
    List(Vec<String>),
}

/// A rule in the legacy schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRule {
    pub result: ConceptLabel,
    #[serde(default, alias = "ageBands")]
    pub age_band: Vec<u8>,
    #[serde(default, alias = "axialLengthBand", alias = "axialLengthBands")]
    pub axial_length: Vec<u8>,
    #[serde(default)]
    pub lens_status: Option<LegacyLensStatus>,
    #[serde(default, alias = "conditions")]
    pub tags: Vec<String>,
}

/// Required and negated categories collected for one axis.
#[derive(Default)]
struct AxisTags {
    required: Vec<String>,
    negated: Vec<String>,
}

impl AxisTags {
    fn is_empty(&self) -> bool {
        self.required.is_empty() && self.negated.is_empty()
    }

    fn allowed<C: AxisCategory>(&self, rule: usize) -> RuleResult<Vec<C>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let parse = |tag: &String| {
            C::from_tag(tag).ok_or_else(|| RuleError::UnknownTag {
                rule,
                tag: format!("{}:{}", C::AXIS.tag(), tag),
            })
        };
        let required = self.required.iter().map(parse).collect::<RuleResult<Vec<C>>>()?;
        let negated = self.negated.iter().map(parse).collect::<RuleResult<Vec<C>>>()?;

        let candidates: Vec<C> = if required.is_empty() {
            C::ALL.to_vec()
        } else {
            required
        };
        let mut allowed: Vec<C> = Vec::new();
        for category in candidates {
            if !negated.contains(&category) && !allowed.contains(&category) {
                allowed.push(category);
            }
        }

        if allowed.is_empty() {
            return Err(RuleError::EmptyAxis {
                rule,
                axis: C::AXIS.tag(),
            });
        }
        Ok(allowed)
    }
}

impl LegacyRule {
    /// Translate into the per-axis schema. `index` is used in errors.
    pub fn into_rule(self, index: usize) -> RuleResult<Rule> {
        let lens_status = match self.lens_status {
            None => Vec::new(),
            Some(LegacyLensStatus::Keyword(keyword)) if keyword.trim().eq_ignore_ascii_case("all") => {
                Vec::new()
            }
            Some(LegacyLensStatus::Keyword(keyword)) => vec![parse_status(&keyword, index)?],
            Some(LegacyLensStatus::List(list)) => list
                .iter()
                .map(|s| parse_status(s, index))
                .collect::<RuleResult<Vec<_>>>()?,
        };

        let mut axes: [AxisTags; 5] = Default::default();
        for raw in &self.tags {
            let (negated, body) = match raw.trim().strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw.trim()),
            };
            let (axis_tag, category) = body.split_once(':').ok_or_else(|| RuleError::UnknownTag {
                rule: index,
                tag: raw.clone(),
            })?;
            let axis = AuxiliaryAxis::from_tag(axis_tag).ok_or_else(|| RuleError::UnknownTag {
                rule: index,
                tag: raw.clone(),
            })?;

            let slot = &mut axes[axis_index(axis)];
            let category = category.trim().to_lowercase();
            if negated {
                slot.negated.push(category);
            } else {
                slot.required.push(category);
            }
        }

        let auxiliary = AuxiliaryConditions {
            refractive_surgery: axes[0].allowed::<RefractiveSurgery>(index)?,
            uncorrected_acuity: axes[1].allowed::<UncorrectedAcuity>(index)?,
            contact_lens: axes[2].allowed::<ContactLensTolerance>(index)?,
            anterior_chamber: axes[3].allowed::<AnteriorChamberDepth>(index)?,
            retinal_risk: axes[4].allowed::<RetinalRisk>(index)?,
        };

        Ok(Rule {
            result: self.result,
            conditions: RuleConditions {
                age_band: self.age_band,
                axial_length_band: self.axial_length,
                lens_status,
                auxiliary,
            },
        })
    }
}

fn axis_index(axis: AuxiliaryAxis) -> usize {
    match axis {
        AuxiliaryAxis::RefractiveSurgery => 0,
        AuxiliaryAxis::UncorrectedAcuity => 1,
        AuxiliaryAxis::ContactLens => 2,
        AuxiliaryAxis::AnteriorChamber => 3,
        AuxiliaryAxis::RetinalRisk => 4,
    }
}

fn parse_status(raw: &str, rule: usize) -> RuleResult<LensStatus> {
    LensStatus::from_tag(raw).ok_or_else(|| RuleError::UnknownTag {
        rule,
        tag: format!("lens_status:{}", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::RuleTable;

    #[test]
    fn test_required_and_negated_tags() {
        let json = r#"[{
            "result": "Full Range of Field – Smooth",
            "ageBand": [2, 3],
            "axialLength": [3],
            "lensStatus": "all",
            "tags": ["contact_lens:does_not_tolerate", "!retinal_risk:high"]
        }]"#;
        let table = RuleTable::from_legacy_json(json).unwrap();
        let rule = &table.rules[0];

        assert_eq!(rule.conditions.age_band, vec![2, 3]);
        assert_eq!(rule.conditions.axial_length_band, vec![3]);
        assert!(rule.conditions.lens_status.is_empty());
        assert_eq!(
            rule.conditions.auxiliary.contact_lens,
            vec![ContactLensTolerance::DoesNotTolerate]
        );
        assert_eq!(
            rule.conditions.auxiliary.retinal_risk,
            vec![RetinalRisk::Low, RetinalRisk::Moderate]
        );
        assert!(rule.conditions.auxiliary.refractive_surgery.is_empty());
    }

    #[test]
    fn test_status_list() {
        let json = r#"[{"result": "A", "lensStatus": ["cataract", "Dysfunctional"]}]"#;
        let table = RuleTable::from_legacy_json(json).unwrap();
        assert_eq!(
            table.rules[0].conditions.lens_status,
            vec![LensStatus::Cataract, LensStatus::Dysfunctional]
        );
    }

    #[test]
    fn test_unknown_tag() {
        let json = r#"[{"result": "A", "tags": ["pupil:large"]}]"#;
        assert!(matches!(
            RuleTable::from_legacy_json(json),
            Err(RuleError::UnknownTag { rule: 0, .. })
        ));

        let json = r#"[{"result": "A", "tags": ["retinal_risk:extreme"]}]"#;
        assert!(matches!(
            RuleTable::from_legacy_json(json),
            Err(RuleError::UnknownTag { .. })
        ));
    }

    #[test]
    fn test_contradictory_tags() {
        let json = r#"[{"result": "A", "tags": ["retinal_risk:low", "!retinal_risk:low"]}]"#;
        assert!(matches!(
            RuleTable::from_legacy_json(json),
            Err(RuleError::EmptyAxis { axis: "retinal_risk", .. })
        ));
    }
}

//! Catalog document normalizer.
//!
//! Pipeline: XML text → record elements → typed [`Lens`] values
//!
//! Handles:
//! - Synonym tag names (tried in a fixed priority order, first present wins)
//! - Absent scalars (→ `None` / empty string, never `0.0`)
//! - Per-record defects (record skipped and logged, parsing continues)
//! - Unreadable sphere ranges / additions (entry dropped, record kept)
//! - Document-level defects (empty catalog, caller falls back to its cache)

mod extract;

pub use extract::*;

use std::collections::HashMap;

use roxmltree::Document;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    Availability, Coefficient, ConstantValues, Constants, Lens, SphereRange, Specifications,
};

/// Defects in a single lens record. The record is skipped, except for
/// sphere range defects, which drop only that range.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record has no id")]
    MissingId,

    #[error("Invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid flag for {field}: {value:?}")]
    InvalidFlag { field: &'static str, value: String },

    #[error("Sphere range #{index} is missing {bound}")]
    IncompleteSphereRange { index: usize, bound: &'static str },
}

/// Document-level normalizer errors.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Catalog document is not well-formed: {0}")]
    Document(#[from] roxmltree::Error),
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// A record dropped during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Position of the record among all record elements
    pub index: usize,
    /// Lens id, if it could be read
    pub id: Option<String>,
    pub error: RecordError,
}

/// Outcome of parsing one catalog document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub lenses: Vec<Lens>,
    pub skipped: Vec<SkippedRecord>,
}

/// Logical catalog fields with configurable tag-name synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    // Sections
    Record,
    Specifications,
    Availability,
    SphereRange,
    Addition,
    Constants,
    SourceBundle,
    OptimizedBundle,
    // Lens scalars
    Id,
    Manufacturer,
    Name,
    Note,
    // Specification scalars
    OpticMaterial,
    HapticMaterial,
    IncisionWidth,
    RefractiveIndex,
    AbbeNumber,
    OpticDiameter,
    HapticDiameter,
    OpticConcept,
    HapticDesign,
    SphericalAberration,
    Toric,
    Technology,
    // Sphere range bounds
    SphereFrom,
    SphereTo,
    SphereIncrement,
    /// Biometry constant
    Constant(Coefficient),
}

/// Normalizer for catalog documents.
pub struct Normalizer {
    /// Field → candidate tag names, highest priority first
    synonyms: HashMap<CatalogField, Vec<String>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default tag names.
    pub fn new() -> Self {
        Self {
            synonyms: Self::default_synonyms(),
        }
    }

    /// Parse a document, absorbing every failure into an empty catalog.
    pub fn normalize(&self, document: &str) -> Vec<Lens> {
        match self.parse_document(document) {
            Ok(report) => report.lenses,
            Err(e) => {
                warn!(error = %e, "Catalog document rejected, returning empty catalog");
                Vec::new()
            }
        }
    }

    /// Parse a document, reporting skipped records.
    ///
    /// Fails only when the document itself is not well-formed.
    pub fn parse_document(&self, document: &str) -> NormalizeResult<ParseReport> {
        let doc = Document::parse(document)?;
        let root = Scope::new(doc.root_element());

        let records = if self.matches(CatalogField::Record, root.name()) {
            vec![root]
        } else {
            root.descendants(self.names(CatalogField::Record))
        };

        let mut report = ParseReport::default();
        for (index, record) in records.into_iter().enumerate() {
            match self.parse_lens(record) {
                Ok(lens) => report.lenses.push(lens),
                Err(error) => {
                    let id = self.record_id(record).map(str::to_string);
                    warn!(index, id = ?id, error = %error, "Skipping malformed lens record");
                    report.skipped.push(SkippedRecord { index, id, error });
                }
            }
        }

        info!(
            parsed = report.lenses.len(),
            skipped = report.skipped.len(),
            "Catalog document normalized"
        );
        Ok(report)
    }

    /// Parse a single record element.
    pub fn parse_lens(&self, record: Scope<'_, '_>) -> Result<Lens, RecordError> {
        let id = self
            .record_id(record)
            .ok_or(RecordError::MissingId)?
            .to_string();

        let specifications = match record.child(self.names(CatalogField::Specifications)) {
            Some(scope) => self.parse_specifications(scope)?,
            None => {
                debug!(%id, "Record has no specifications section");
                Specifications::default()
            }
        };

        let availability = match record.child(self.names(CatalogField::Availability)) {
            Some(scope) => self.parse_availability(&id, scope),
            None => Availability::default(),
        };

        Ok(Lens {
            manufacturer: self.string(record, CatalogField::Manufacturer),
            name: self.string(record, CatalogField::Name),
            note: self.optional_string(record, CatalogField::Note),
            specifications,
            availability,
            constants: self.parse_constants(record)?,
            id,
        })
    }

    fn record_id<'a>(&self, record: Scope<'a, '_>) -> Option<&'a str> {
        record
            .attribute(self.names(CatalogField::Id))
            .or_else(|| record.text(self.names(CatalogField::Id)))
    }

    fn parse_specifications(&self, scope: Scope<'_, '_>) -> Result<Specifications, RecordError> {
        let toric = match self.text(scope, CatalogField::Toric) {
            None => false,
            Some(raw) => parse_flag(raw).ok_or_else(|| RecordError::InvalidFlag {
                field: "toric",
                value: raw.to_string(),
            })?,
        };

        Ok(Specifications {
            optic_material: self.string(scope, CatalogField::OpticMaterial),
            haptic_material: self.string(scope, CatalogField::HapticMaterial),
            incision_width: self.number(scope, CatalogField::IncisionWidth, "incisionWidth")?,
            refractive_index: self.number(scope, CatalogField::RefractiveIndex, "refractiveIndex")?,
            abbe_number: self.number(scope, CatalogField::AbbeNumber, "abbeNumber")?,
            optic_diameter: self.number(scope, CatalogField::OpticDiameter, "opticDiameter")?,
            haptic_diameter: self.number(scope, CatalogField::HapticDiameter, "hapticDiameter")?,
            optic_concept: self.string(scope, CatalogField::OpticConcept),
            haptic_design: self.string(scope, CatalogField::HapticDesign),
            spherical_aberration: self.string(scope, CatalogField::SphericalAberration),
            toric,
            technology: self.optional_string(scope, CatalogField::Technology),
        })
    }

    /// Collect every parsable sphere range and addition.
    ///
    /// A range or addition that cannot be read is dropped on its own; the
    /// record itself is kept.
    fn parse_availability(&self, id: &str, scope: Scope<'_, '_>) -> Availability {
        let mut availability = Availability::default();

        for (index, range) in scope
            .children(self.names(CatalogField::SphereRange))
            .into_iter()
            .enumerate()
        {
            match self.parse_sphere_range(index, range) {
                Ok(range) => availability.sphere_ranges.push(range),
                Err(error) => warn!(%id, %error, "Skipping sphere range"),
            }
        }

        for addition in scope.children(self.names(CatalogField::Addition)) {
            let Some(raw) = addition.own_text() else {
                continue;
            };
            match parse_number(raw) {
                Some(value) => availability.additions.push(value),
                None => warn!(%id, value = raw, "Skipping unparsable addition"),
            }
        }

        availability
    }

    fn parse_sphere_range(&self, index: usize, range: Scope<'_, '_>) -> Result<SphereRange, RecordError> {
        let from = self
            .number(range, CatalogField::SphereFrom, "sphereRange.from")?
            .ok_or(RecordError::IncompleteSphereRange { index, bound: "from" })?;
        let to = self
            .number(range, CatalogField::SphereTo, "sphereRange.to")?
            .ok_or(RecordError::IncompleteSphereRange { index, bound: "to" })?;
        let increment = self.number(range, CatalogField::SphereIncrement, "sphereRange.increment")?;
        Ok(SphereRange { from, to, increment })
    }

    /// Collect constants from every constants section of a record.
    ///
    /// A section is assigned to a bundle by its `type` attribute, by nested
    /// bundle elements, or defaults to the published bundle. Values already
    /// set by an earlier section are kept.
    fn parse_constants(&self, record: Scope<'_, '_>) -> Result<Constants, RecordError> {
        let mut constants = Constants::default();

        for section in record.children(self.names(CatalogField::Constants)) {
            match section.attribute(&["type", "kind"]) {
                Some(kind) if self.matches(CatalogField::OptimizedBundle, kind) => {
                    self.fill_bundle(section, &mut constants.optimized)?;
                }
                Some(kind) if self.matches(CatalogField::SourceBundle, kind) => {
                    self.fill_bundle(section, &mut constants.source)?;
                }
                _ => {
                    let source = section.child(self.names(CatalogField::SourceBundle));
                    let optimized = section.child(self.names(CatalogField::OptimizedBundle));
                    if source.is_none() && optimized.is_none() {
                        self.fill_bundle(section, &mut constants.source)?;
                    }
                    if let Some(scope) = source {
                        self.fill_bundle(scope, &mut constants.source)?;
                    }
                    if let Some(scope) = optimized {
                        self.fill_bundle(scope, &mut constants.optimized)?;
                    }
                }
            }
        }

        Ok(constants)
    }

    fn fill_bundle(&self, scope: Scope<'_, '_>, bundle: &mut ConstantValues) -> Result<(), RecordError> {
        for coefficient in Coefficient::ALL {
            let slot = bundle.slot_mut(coefficient);
            if slot.is_some() {
                continue;
            }
            *slot = self.number(scope, CatalogField::Constant(coefficient), coefficient_field(coefficient))?;
        }
        Ok(())
    }

    fn text<'a>(&self, scope: Scope<'a, '_>, field: CatalogField) -> Option<&'a str> {
        scope.text(self.names(field))
    }

    fn string(&self, scope: Scope<'_, '_>, field: CatalogField) -> String {
        self.text(scope, field).unwrap_or_default().to_string()
    }

    fn optional_string(&self, scope: Scope<'_, '_>, field: CatalogField) -> Option<String> {
        self.text(scope, field).map(str::to_string)
    }

    fn number(
        &self,
        scope: Scope<'_, '_>,
        field: CatalogField,
        label: &'static str,
    ) -> Result<Option<f64>, RecordError> {
        match self.text(scope, field) {
            None => Ok(None),
            Some(raw) => parse_number(raw)
                .map(Some)
                .ok_or_else(|| RecordError::InvalidNumber {
                    field: label,
                    value: raw.to_string(),
                }),
        }
    }

    /// Candidate tag names for a field, highest priority first.
    pub fn names(&self, field: CatalogField) -> &[String] {
        self.synonyms.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn matches(&self, field: CatalogField, name: &str) -> bool {
        self.names(field).iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Add a tag name for a field at the lowest priority.
    pub fn add_synonym(&mut self, field: CatalogField, name: &str) {
        let names = self.synonyms.entry(field).or_default();
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }

    /// Default tag names.
    fn default_synonyms() -> HashMap<CatalogField, Vec<String>> {
        let mut map: HashMap<CatalogField, Vec<String>> = HashMap::new();
        let mut add = |field: CatalogField, names: &[&str]| {
            map.insert(field, names.iter().map(|n| n.to_string()).collect());
        };

        // Sections
        add(CatalogField::Record, &["Lens", "IOL"]);
        add(CatalogField::Specifications, &["Specifications", "Specification", "Specs"]);
        add(CatalogField::Availability, &["Availability"]);
        add(CatalogField::SphereRange, &["Sphere-Range", "SphereRange", "Sphere"]);
        add(CatalogField::Addition, &["Addition", "Add"]);
        add(CatalogField::Constants, &["Constants"]);
        add(CatalogField::SourceBundle, &["Source", "Nominal"]);
        add(CatalogField::OptimizedBundle, &["Optimized", "Optimised"]);

        // Lens
        add(CatalogField::Id, &["id", "LensId"]);
        add(CatalogField::Manufacturer, &["Manufacturer", "Company"]);
        add(CatalogField::Name, &["Name", "Model"]);
        add(CatalogField::Note, &["Note", "Notes", "Comment"]);

        // Specifications
        add(CatalogField::OpticMaterial, &["OpticMaterial", "Material"]);
        add(CatalogField::HapticMaterial, &["HapticMaterial"]);
        add(CatalogField::IncisionWidth, &["IncisionWidth", "Incision"]);
        add(CatalogField::RefractiveIndex, &["RefractiveIndex"]);
        add(CatalogField::AbbeNumber, &["AbbeNumber", "Abbe"]);
        add(CatalogField::OpticDiameter, &["OpticDiameter"]);
        add(CatalogField::HapticDiameter, &["HapticDiameter", "OverallDiameter"]);
        add(CatalogField::OpticConcept, &["OpticConcept", "OpticDesign"]);
        add(CatalogField::HapticDesign, &["HapticDesign"]);
        add(CatalogField::SphericalAberration, &["SphericalAberration", "Aberration"]);
        add(CatalogField::Toric, &["Toric"]);
        add(CatalogField::Technology, &["Technology"]);

        // Sphere ranges
        add(CatalogField::SphereFrom, &["From", "Min"]);
        add(CatalogField::SphereTo, &["To", "Max"]);
        add(CatalogField::SphereIncrement, &["Increment", "Step"]);

        // Biometry constants
        add(
            CatalogField::Constant(Coefficient::Ultrasound),
            &["Ultrasound", "UltrasoundA", "A-Ultrasound"],
        );
        add(
            CatalogField::Constant(Coefficient::SrkT),
            &["SRKt", "SRKt/A", "SRK-T", "SRKTA"],
        );
        add(
            CatalogField::Constant(Coefficient::HofferQ),
            &["HofferQ", "HofferQ/pACD", "pACD", "ACD"],
        );
        add(
            CatalogField::Constant(Coefficient::Holladay1),
            &["Holladay1", "Holladay1/sf", "sf", "SurgeonFactor"],
        );
        add(
            CatalogField::Constant(Coefficient::Barrett),
            &["Barrett", "Barrett/LF", "LF", "LensFactor"],
        );
        add(
            CatalogField::Constant(Coefficient::HaigisA0),
            &["Haigis/a0", "HaigisA0", "a0"],
        );
        add(
            CatalogField::Constant(Coefficient::HaigisA1),
            &["Haigis/a1", "HaigisA1", "a1"],
        );
        add(
            CatalogField::Constant(Coefficient::HaigisA2),
            &["Haigis/a2", "HaigisA2", "a2"],
        );

        map
    }
}

fn coefficient_field(coefficient: Coefficient) -> &'static str {
    match coefficient {
        Coefficient::Ultrasound => "constants.ultrasound",
        Coefficient::SrkT => "constants.srkt",
        Coefficient::HofferQ => "constants.hofferQ",
        Coefficient::Holladay1 => "constants.holladay1",
        Coefficient::Barrett => "constants.barrett",
        Coefficient::HaigisA0 => "constants.haigisA0",
        Coefficient::HaigisA1 => "constants.haigisA1",
        Coefficient::HaigisA2 => "constants.haigisA2",
    }
}

/// Normalize a document with the default tag names.
pub fn normalize(document: &str) -> Vec<Lens> {
    Normalizer::new().normalize(document)
}

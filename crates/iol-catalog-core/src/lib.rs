//! IOL Catalog Core Library
//!
//! Local intraocular lens catalog with surgeon overrides and a clinical
//! recommendation rule engine.
//!
//! # Architecture
//!
//! ```text
//! Catalog XML ──► Normalizer ──► base lenses ─┐
//!                                             ├──► merge ──► CatalogView ──► filter / search
//! SQLite lens_overrides ──► OverrideMap ──────┘                   │
//!                                                                 ▼
//! PatientInput ──► banding ──► rule table ──► concept labels ──► Recommended filter
//! ```
//!
//! # Core Principle
//!
//! **Overrides never touch the catalog.** The catalog can be refreshed at any
//! time; overrides are stored separately and re-applied to each new catalog.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Lens, Rule, PatientInput, etc.)
//! - [`normalizer`]: Catalog document parsing
//! - [`overrides`]: Sparse patches and deep merge
//! - [`catalog`]: Versioned catalog snapshots
//! - [`filter`]: Attribute filter engine
//! - [`recommend`]: Recommendation rule engine
//! - [`search`]: Fuzzy lens lookup
//! - [`db`]: SQLite persistence of overrides and the catalog cache
//! - [`config`]: TOML configuration
//! - [`logging`]: Tracing subscriber setup

pub mod catalog;
pub mod config;
pub mod db;
pub mod filter;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod overrides;
pub mod recommend;
pub mod search;

// Re-export commonly used types
pub use catalog::{CatalogState, CatalogView, IngestOutcome};
pub use config::CoreConfig;
pub use db::Database;
pub use filter::{filter, FilterCriteria, FilterMode, ToricFilter};
pub use models::{
    AuxiliaryInput, ClinicalConcept, ConceptLabel, Constants, Lens, LensStatus, PatientInput,
    Rule, RuleConditions,
};
pub use normalizer::{normalize, Normalizer};
pub use overrides::{merge, LensPatch, OverrideMap};
pub use recommend::{recommend, RuleTable};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use models::AxisCategory;
use tracing::info;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum IolCatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Rule table error: {0}")]
    RuleTableError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for IolCatalogError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => IolCatalogError::NotFound(what),
            other => IolCatalogError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IolCatalogError {
    fn from(e: serde_json::Error) -> Self {
        IolCatalogError::SerializationError(e.to_string())
    }
}

impl From<recommend::RuleError> for IolCatalogError {
    fn from(e: recommend::RuleError) -> Self {
        IolCatalogError::RuleTableError(e.to_string())
    }
}

impl From<anyhow::Error> for IolCatalogError {
    fn from(e: anyhow::Error) -> Self {
        IolCatalogError::ConfigError(format!("{:#}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for IolCatalogError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        IolCatalogError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<IolCatalogCore>, IolCatalogError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(IolCatalogCore::with_database(db)?))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<IolCatalogCore>, IolCatalogError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(IolCatalogCore::with_database(db)?))
}

/// Open the core from a TOML config file.
///
/// Initializes logging, opens the database, restores the cached catalog
/// and loads the configured rule table.
#[uniffi::export]
pub fn open_from_config(path: String) -> Result<Arc<IolCatalogCore>, IolCatalogError> {
    let config = CoreConfig::load(&path)?;
    logging::init_logging(&config.logging.filter);

    if let Some(dir) = config.storage.database_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .map_err(|e| IolCatalogError::ConfigError(format!("{}: {}", dir.display(), e)))?;
        }
    }

    let core = IolCatalogCore::with_database(Database::open(&config.storage.database_path)?)?;
    core.restore_cached_catalog()?;
    if let Some(table_path) = &config.rules.table_path {
        core.load_rules_from(table_path, config.rules.legacy_format)?;
    }

    info!(config = %path, "Core opened from config");
    Ok(Arc::new(core))
}

/// Install the global log subscriber. Returns `false` if one already exists.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    logging::init_logging(&filter)
}

/// Labels of the well-known clinical concepts, in display order.
#[uniffi::export]
pub fn clinical_concept_labels() -> Vec<String> {
    ClinicalConcept::ALL
        .iter()
        .map(|c| c.label().to_string())
        .collect()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe catalog core for FFI.
#[derive(uniffi::Object)]
pub struct IolCatalogCore {
    db: Arc<Mutex<Database>>,
    state: CatalogState,
    rules: RwLock<Arc<RuleTable>>,
}

impl IolCatalogCore {
    /// Wrap a database, loading its persisted overrides.
    pub fn with_database(db: Database) -> Result<Self, IolCatalogError> {
        let overrides = db.load_overrides()?;
        let state = CatalogState::default();
        state.replace_overrides(overrides);
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            state,
            rules: RwLock::new(Arc::new(RuleTable::default())),
        })
    }

    /// Current catalog snapshot.
    pub fn snapshot(&self) -> Arc<CatalogView> {
        self.state.snapshot()
    }

    fn rule_table(&self) -> Result<Arc<RuleTable>, IolCatalogError> {
        Ok(Arc::clone(&*self.rules.read()?))
    }

    fn install_rules(&self, table: RuleTable) -> Result<u32, IolCatalogError> {
        let count = table.len() as u32;
        *self.rules.write()? = Arc::new(table);
        Ok(count)
    }

    fn load_rules_from(&self, path: &Path, legacy_format: bool) -> Result<u32, IolCatalogError> {
        let table = RuleTable::from_path(path, legacy_format)?;
        self.install_rules(table)
    }

    /// Re-read the override table into the catalog state.
    fn refresh_overrides(&self, db: &Database) -> Result<(), IolCatalogError> {
        let overrides = db.load_overrides()?;
        self.state.replace_overrides(overrides);
        Ok(())
    }

    fn to_ffi_lenses(&self, view: &CatalogView, lenses: &[Lens]) -> Vec<FfiLens> {
        lenses
            .iter()
            .map(|lens| FfiLens::from_lens(lens, view.is_overridden(&lens.id)))
            .collect()
    }
}

#[uniffi::export]
impl IolCatalogCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Normalize a catalog document and make it the current base catalog.
    ///
    /// An unparsable document keeps the previous catalog. A parsed document
    /// is also written to the catalog cache.
    pub fn ingest_catalog(&self, document: String) -> Result<FfiIngestReport, IolCatalogError> {
        // Held until the cache write: the cached document must match the snapshot.
        let db = self.db.lock()?;
        let outcome = self.state.ingest_document(&document);
        if let IngestOutcome::Replaced { lens_count, .. } = &outcome {
            db.save_catalog_cache(&document, *lens_count)?;
        }
        Ok(outcome.into())
    }

    /// Re-ingest the cached catalog document, if one was saved.
    pub fn restore_cached_catalog(&self) -> Result<Option<FfiIngestReport>, IolCatalogError> {
        let cached = {
            let db = self.db.lock()?;
            db.load_catalog_cache()?
        };
        let Some(cached) = cached else {
            return Ok(None);
        };

        let outcome = self.state.ingest_document(&cached.document);
        info!(hash = %cached.content_hash, cached_at = %cached.cached_at, "Cached catalog restored");
        Ok(Some(outcome.into()))
    }

    /// Version of the current catalog snapshot.
    pub fn catalog_version(&self) -> u64 {
        self.state.snapshot().version
    }

    /// All merged lenses, in catalog order.
    pub fn list_lenses(&self) -> Vec<FfiLens> {
        let view = self.state.snapshot();
        self.to_ffi_lenses(&view, &view.lenses)
    }

    /// One merged lens by id.
    pub fn get_lens(&self, lens_id: String) -> Option<FfiLens> {
        let view = self.state.snapshot();
        view.get(&lens_id)
            .map(|lens| FfiLens::from_lens(lens, view.is_overridden(&lens_id)))
    }

    /// One merged lens by id, as JSON.
    pub fn get_lens_json(&self, lens_id: String) -> Result<Option<String>, IolCatalogError> {
        let view = self.state.snapshot();
        view.get(&lens_id)
            .map(|lens| serde_json::to_string(lens).map_err(IolCatalogError::from))
            .transpose()
    }

    // =========================================================================
    // Override Operations
    // =========================================================================

    /// Set the override for a lens from a JSON patch. An empty patch removes it.
    pub fn set_override(&self, lens_id: String, patch_json: String) -> Result<(), IolCatalogError> {
        let patch: LensPatch = serde_json::from_str(&patch_json)?;
        let db = self.db.lock()?;
        if patch.is_empty() {
            match db.delete_override(&lens_id) {
                Ok(()) | Err(db::DbError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            db.upsert_override(&lens_id, &patch)?;
        }
        self.refresh_overrides(&db)
    }

    /// JSON patch currently stored for a lens.
    pub fn get_override(&self, lens_id: String) -> Result<Option<String>, IolCatalogError> {
        let db = self.db.lock()?;
        db.get_override(&lens_id)?
            .map(|patch| serde_json::to_string(&patch).map_err(IolCatalogError::from))
            .transpose()
    }

    /// Revert a lens to its catalog values. Fails with `NotFound` if it had
    /// no override.
    pub fn remove_override(&self, lens_id: String) -> Result<(), IolCatalogError> {
        let db = self.db.lock()?;
        db.delete_override(&lens_id)?;
        self.refresh_overrides(&db)
    }

    /// Replace every override from a JSON object keyed by lens id.
    pub fn replace_overrides(&self, overrides_json: String) -> Result<(), IolCatalogError> {
        let overrides: OverrideMap = serde_json::from_str(&overrides_json)?;
        let mut db = self.db.lock()?;
        db.replace_overrides(&overrides)?;
        self.refresh_overrides(&db)
    }

    /// Every override as a JSON object keyed by lens id.
    pub fn export_overrides_json(&self) -> Result<String, IolCatalogError> {
        let db = self.db.lock()?;
        let overrides = db.load_overrides()?;
        Ok(serde_json::to_string_pretty(&overrides)?)
    }

    // =========================================================================
    // Filter Operations
    // =========================================================================

    /// Basic-mode filter over the merged catalog.
    pub fn filter_lenses(&self, criteria: FfiFilterCriteria) -> Vec<FfiLens> {
        let view = self.state.snapshot();
        let lenses = filter::filter(&view.lenses, &FilterMode::Basic, &criteria.into());
        self.to_ffi_lenses(&view, &lenses)
    }

    /// Filter by a set of recommended concept labels.
    pub fn filter_recommended(
        &self,
        concepts: Vec<String>,
        criteria: FfiFilterCriteria,
    ) -> Vec<FfiLens> {
        let view = self.state.snapshot();
        let mode = FilterMode::Recommended(concepts.into_iter().map(ConceptLabel).collect());
        let lenses = filter::filter(&view.lenses, &mode, &criteria.into());
        self.to_ffi_lenses(&view, &lenses)
    }

    /// Apply a clinical concept selection to a set of criteria.
    pub fn select_clinical_concept(
        &self,
        criteria: FfiFilterCriteria,
        label: String,
    ) -> FfiFilterCriteria {
        let mut criteria: FilterCriteria = criteria.into();
        criteria.select_clinical_concept(&label);
        criteria.into()
    }

    /// Distinct manufacturers in the merged catalog.
    pub fn manufacturers(&self) -> Vec<String> {
        filter::manufacturers(&self.state.snapshot().lenses)
    }

    /// Distinct optic classes in the merged catalog.
    pub fn optic_classes(&self) -> Vec<String> {
        filter::optic_classes(&self.state.snapshot().lenses)
    }

    /// Fuzzy lookup by name and manufacturer.
    pub fn search_lenses(&self, query: String, limit: u32) -> Vec<FfiLensMatch> {
        let view = self.state.snapshot();
        search::search_lenses(&view.lenses, &query, limit as usize)
            .into_iter()
            .map(|m| m.into())
            .collect()
    }

    // =========================================================================
    // Recommendation Operations
    // =========================================================================

    /// Load a rule table from JSON. Returns the rule count.
    pub fn load_rules_json(&self, json: String, legacy_format: bool) -> Result<u32, IolCatalogError> {
        let table = if legacy_format {
            RuleTable::from_legacy_json(&json)?
        } else {
            RuleTable::from_json(&json)?
        };
        self.install_rules(table)
    }

    /// Load a rule table from a file. Returns the rule count.
    pub fn load_rules_file(&self, path: String, legacy_format: bool) -> Result<u32, IolCatalogError> {
        self.load_rules_from(Path::new(&path), legacy_format)
    }

    /// Version string of the loaded rule table.
    pub fn rule_table_version(&self) -> Result<Option<String>, IolCatalogError> {
        Ok(self.rule_table()?.version.clone())
    }

    /// Recommended concept labels for a patient, deduplicated in rule order.
    pub fn recommend(&self, patient: FfiPatientInput) -> Result<Vec<String>, IolCatalogError> {
        let input = PatientInput::try_from(patient)?;
        let table = self.rule_table()?;
        Ok(table
            .recommend(&input)
            .into_iter()
            .map(|label| label.0)
            .collect())
    }

    /// Indices of the rules matching a patient.
    pub fn matching_rules(&self, patient: FfiPatientInput) -> Result<Vec<u32>, IolCatalogError> {
        let input = PatientInput::try_from(patient)?;
        let table = self.rule_table()?;
        Ok(recommend::evaluate(&input, &table.rules)
            .into_iter()
            .map(|i| i as u32)
            .collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe sphere range.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSphereRange {
    pub from_diopters: f64,
    pub to_diopters: f64,
    pub increment: Option<f64>,
}

/// FFI-safe formula coefficient with both bundles.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConstant {
    pub family: String,
    pub coefficient: String,
    pub source: Option<f64>,
    pub optimized: Option<f64>,
}

/// FFI-safe merged lens.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLens {
    pub id: String,
    pub manufacturer: String,
    pub name: String,
    pub note: Option<String>,
    pub optic_material: String,
    pub haptic_material: String,
    pub optic_concept: String,
    pub haptic_design: String,
    pub spherical_aberration: String,
    pub incision_width: Option<f64>,
    pub refractive_index: Option<f64>,
    pub abbe_number: Option<f64>,
    pub optic_diameter: Option<f64>,
    pub haptic_diameter: Option<f64>,
    pub toric: bool,
    pub technology: Option<String>,
    pub sphere_ranges: Vec<FfiSphereRange>,
    pub additions: Vec<f64>,
    pub min_sphere: f64,
    pub max_sphere: f64,
    pub total_diopter_range: f64,
    /// Only coefficients with a value in either bundle
    pub constants: Vec<FfiConstant>,
    pub present_families: Vec<String>,
    pub overridden: bool,
}

impl FfiLens {
    fn from_lens(lens: &Lens, overridden: bool) -> Self {
        let specs = &lens.specifications;
        let availability = &lens.availability;
        let constants = models::Coefficient::ALL
            .into_iter()
            .filter_map(|c| {
                let source = lens.constants.source.get(c);
                let optimized = lens.constants.optimized.get(c);
                (source.is_some() || optimized.is_some()).then(|| FfiConstant {
                    family: c.family().label().to_string(),
                    coefficient: c.key().to_string(),
                    source,
                    optimized,
                })
            })
            .collect();

        Self {
            id: lens.id.clone(),
            manufacturer: lens.manufacturer.clone(),
            name: lens.name.clone(),
            note: lens.note.clone(),
            optic_material: specs.optic_material.clone(),
            haptic_material: specs.haptic_material.clone(),
            optic_concept: specs.optic_concept.clone(),
            haptic_design: specs.haptic_design.clone(),
            spherical_aberration: specs.spherical_aberration.clone(),
            incision_width: specs.incision_width,
            refractive_index: specs.refractive_index,
            abbe_number: specs.abbe_number,
            optic_diameter: specs.optic_diameter,
            haptic_diameter: specs.haptic_diameter,
            toric: specs.toric,
            technology: specs.technology.clone(),
            sphere_ranges: availability
                .sphere_ranges
                .iter()
                .map(|r| FfiSphereRange {
                    from_diopters: r.from,
                    to_diopters: r.to,
                    increment: r.increment,
                })
                .collect(),
            additions: availability.additions.clone(),
            min_sphere: availability.min_sphere(),
            max_sphere: availability.max_sphere(),
            total_diopter_range: availability.total_diopter_range(),
            constants,
            present_families: lens
                .constants
                .present_families()
                .into_iter()
                .map(|f| f.label().to_string())
                .collect(),
            overridden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiIngestStatus {
    Replaced,
    Unchanged,
    Retained,
}

/// FFI-safe skipped record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSkippedRecord {
    pub index: u32,
    pub lens_id: Option<String>,
    pub reason: String,
}

/// FFI-safe catalog ingest result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIngestReport {
    pub status: FfiIngestStatus,
    pub version: u64,
    pub lens_count: u32,
    pub skipped: Vec<FfiSkippedRecord>,
    /// Why the document was rejected, for `Retained`
    pub reason: Option<String>,
}

impl From<IngestOutcome> for FfiIngestReport {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Replaced {
                version,
                lens_count,
                skipped,
                ..
            } => Self {
                status: FfiIngestStatus::Replaced,
                version,
                lens_count: lens_count as u32,
                skipped: skipped
                    .into_iter()
                    .map(|s| FfiSkippedRecord {
                        index: s.index as u32,
                        lens_id: s.id,
                        reason: s.error.to_string(),
                    })
                    .collect(),
                reason: None,
            },
            IngestOutcome::Unchanged { version } => Self {
                status: FfiIngestStatus::Unchanged,
                version,
                lens_count: 0,
                skipped: Vec::new(),
                reason: None,
            },
            IngestOutcome::Retained { version, reason } => Self {
                status: FfiIngestStatus::Retained,
                version,
                lens_count: 0,
                skipped: Vec::new(),
                reason: Some(reason),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiToricFilter {
    All,
    Yes,
    No,
}

/// FFI-safe filter criteria. `"all"` disables a string criterion.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiFilterCriteria {
    pub manufacturer: String,
    pub optic_class: String,
    pub toric: FfiToricFilter,
}

impl From<FfiFilterCriteria> for FilterCriteria {
    fn from(criteria: FfiFilterCriteria) -> Self {
        FilterCriteria {
            manufacturer: criteria.manufacturer,
            optic_class: criteria.optic_class,
            toric: match criteria.toric {
                FfiToricFilter::All => ToricFilter::All,
                FfiToricFilter::Yes => ToricFilter::Yes,
                FfiToricFilter::No => ToricFilter::No,
            },
        }
    }
}

impl From<FilterCriteria> for FfiFilterCriteria {
    fn from(criteria: FilterCriteria) -> Self {
        Self {
            manufacturer: criteria.manufacturer,
            optic_class: criteria.optic_class,
            toric: match criteria.toric {
                ToricFilter::All => FfiToricFilter::All,
                ToricFilter::Yes => FfiToricFilter::Yes,
                ToricFilter::No => FfiToricFilter::No,
            },
        }
    }
}

/// FFI-safe search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLensMatch {
    pub lens_id: String,
    pub name: String,
    pub manufacturer: String,
    pub score: f64,
}

impl From<search::LensMatch> for FfiLensMatch {
    fn from(m: search::LensMatch) -> Self {
        Self {
            lens_id: m.id,
            name: m.name,
            manufacturer: m.manufacturer,
            score: m.score,
        }
    }
}

/// FFI-safe patient parameters. Categorical values are tags such as
/// `"cataract"` or `"myopic_laser"`; `None` means unspecified.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiPatientInput {
    pub age: String,
    pub axial_length: String,
    pub lens_status: Option<String>,
    pub refractive_surgery: Option<String>,
    pub uncorrected_acuity: Option<String>,
    pub contact_lens: Option<String>,
    pub anterior_chamber: Option<String>,
    pub retinal_risk: Option<String>,
}

fn parse_category<C: AxisCategory>(tag: Option<String>) -> Result<Option<C>, IolCatalogError> {
    tag.map(|tag| {
        C::from_tag(&tag).ok_or_else(|| {
            IolCatalogError::InvalidInput(format!("unknown {} value {:?}", C::AXIS.tag(), tag))
        })
    })
    .transpose()
}

impl TryFrom<FfiPatientInput> for PatientInput {
    type Error = IolCatalogError;

    fn try_from(input: FfiPatientInput) -> Result<Self, Self::Error> {
        let lens_status = input
            .lens_status
            .map(|tag| {
                LensStatus::from_tag(&tag).ok_or_else(|| {
                    IolCatalogError::InvalidInput(format!("unknown lens status {:?}", tag))
                })
            })
            .transpose()?;

        Ok(PatientInput {
            age: input.age,
            axial_length: input.axial_length,
            lens_status,
            auxiliary: AuxiliaryInput {
                refractive_surgery: parse_category(input.refractive_surgery)?,
                uncorrected_acuity: parse_category(input.uncorrected_acuity)?,
                contact_lens: parse_category(input.contact_lens)?,
                anterior_chamber: parse_category(input.anterior_chamber)?,
                retinal_risk: parse_category(input.retinal_risk)?,
            },
        })
    }
}

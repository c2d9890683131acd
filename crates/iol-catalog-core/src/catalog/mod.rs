//! Materialized catalog view.
//!
//! The current catalog is an immutable, versioned [`CatalogView`] replaced
//! wholesale whenever the base catalog or the override map changes.
//! Readers take an `Arc` snapshot and never observe a partial update.

use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::models::Lens;
use crate::normalizer::{NormalizeError, Normalizer, SkippedRecord};
use crate::overrides::{merge, OverrideMap};

/// Hex SHA-256 of a catalog document.
pub fn content_hash(document: &str) -> String {
    hex::encode(Sha256::digest(document.as_bytes()))
}

/// One consistent snapshot of the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogView {
    /// Incremented on every replacement
    pub version: u64,
    /// Hash of the document the base catalog was parsed from
    pub source_hash: Option<String>,
    /// Normalizer output
    pub base: Arc<Vec<Lens>>,
    /// Override map the view was merged with
    pub overrides: Arc<OverrideMap>,
    /// Merged lenses
    pub lenses: Arc<Vec<Lens>>,
}

impl CatalogView {
    /// Build a view by merging a base catalog with overrides.
    pub fn build(
        version: u64,
        source_hash: Option<String>,
        base: Arc<Vec<Lens>>,
        overrides: Arc<OverrideMap>,
    ) -> Self {
        let lenses = Arc::new(merge(&base, &overrides));
        Self {
            version,
            source_hash,
            base,
            overrides,
            lenses,
        }
    }

    /// Merged lens by id.
    pub fn get(&self, id: &str) -> Option<&Lens> {
        self.lenses.iter().find(|l| l.id == id)
    }

    /// Base (un-overridden) lens by id.
    pub fn base_lens(&self, id: &str) -> Option<&Lens> {
        self.base.iter().find(|l| l.id == id)
    }

    /// Check whether a lens currently carries an override.
    pub fn is_overridden(&self, id: &str) -> bool {
        self.overrides.contains_key(id) && self.base_lens(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lenses.is_empty()
    }
}

/// Result of feeding a document to [`CatalogState::ingest_document`].
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The document parsed and replaced the base catalog.
    Replaced {
        version: u64,
        lens_count: usize,
        skipped: Vec<SkippedRecord>,
        source_hash: String,
    },
    /// The document hashed identically to the current one.
    Unchanged { version: u64 },
    /// The document could not be parsed; the previous view is kept.
    Retained { version: u64, reason: String },
}

/// Owner of the current catalog snapshot.
pub struct CatalogState {
    normalizer: Normalizer,
    current: RwLock<Arc<CatalogView>>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new(Normalizer::new())
    }
}

impl CatalogState {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            current: RwLock::new(Arc::new(CatalogView::default())),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogView> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn replace<F>(&self, build: F) -> Arc<CatalogView>
    where
        F: FnOnce(&CatalogView) -> CatalogView,
    {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(build(&guard));
        *guard = Arc::clone(&next);
        next
    }

    /// Parse a document and, if it is well-formed, replace the base catalog.
    pub fn ingest_document(&self, document: &str) -> IngestOutcome {
        let source_hash = content_hash(document);
        let current = self.snapshot();
        if current.source_hash.as_deref() == Some(source_hash.as_str()) {
            return IngestOutcome::Unchanged {
                version: current.version,
            };
        }

        let report = match self.normalizer.parse_document(document) {
            Ok(report) => report,
            Err(NormalizeError::Document(e)) => {
                warn!(error = %e, version = current.version, "Catalog document rejected, keeping previous catalog");
                return IngestOutcome::Retained {
                    version: current.version,
                    reason: e.to_string(),
                };
            }
        };

        let lens_count = report.lenses.len();
        let base = Arc::new(report.lenses);
        let hash = source_hash.clone();
        let view = self.replace(move |previous| {
            CatalogView::build(
                previous.version + 1,
                Some(hash),
                base,
                Arc::clone(&previous.overrides),
            )
        });

        info!(version = view.version, lens_count, "Catalog replaced");
        IngestOutcome::Replaced {
            version: view.version,
            lens_count,
            skipped: report.skipped,
            source_hash,
        }
    }

    /// Replace the override map, keeping the base catalog.
    pub fn replace_overrides(&self, overrides: OverrideMap) -> Arc<CatalogView> {
        let overrides = Arc::new(overrides);
        let view = self.replace(move |previous| {
            CatalogView::build(
                previous.version + 1,
                previous.source_hash.clone(),
                Arc::clone(&previous.base),
                overrides,
            )
        });
        info!(version = view.version, overrides = view.overrides.len(), "Overrides replaced");
        view
    }
}

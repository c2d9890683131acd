//! Catalog cache database operations.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Database, DbResult};
use crate::catalog::content_hash;

/// The last catalog document that parsed successfully.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedCatalog {
    pub document: String,
    pub content_hash: String,
    pub lens_count: u32,
    pub cached_at: String,
}

impl Database {
    /// Store a document as the catalog cache, replacing any previous one.
    pub fn save_catalog_cache(&self, document: &str, lens_count: usize) -> DbResult<CachedCatalog> {
        let cached = CachedCatalog {
            document: document.to_string(),
            content_hash: content_hash(document),
            lens_count: lens_count as u32,
            cached_at: chrono::Utc::now().to_rfc3339(),
        };

        self.conn.execute(
            r#"
            INSERT INTO catalog_cache (id, document, content_hash, lens_count, cached_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                content_hash = excluded.content_hash,
                lens_count = excluded.lens_count,
                cached_at = excluded.cached_at
            "#,
            params![
                cached.document,
                cached.content_hash,
                cached.lens_count,
                cached.cached_at,
            ],
        )?;

        info!(hash = %cached.content_hash, lens_count, "Catalog cache updated");
        Ok(cached)
    }

    /// Load the cached document, if any.
    pub fn load_catalog_cache(&self) -> DbResult<Option<CachedCatalog>> {
        let cached = self
            .conn
            .query_row(
                "SELECT document, content_hash, lens_count, cached_at FROM catalog_cache WHERE id = 1",
                [],
                |row| {
                    Ok(CachedCatalog {
                        document: row.get(0)?,
                        content_hash: row.get(1)?,
                        lens_count: row.get(2)?,
                        cached_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(cached)
    }

    /// Drop the cached document.
    pub fn clear_catalog_cache(&self) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM catalog_cache", [])?;
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_catalog_cache().unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let saved = db.save_catalog_cache("<Catalog/>", 0).unwrap();

        let loaded = db.load_catalog_cache().unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.content_hash, content_hash("<Catalog/>"));
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.cached_at).is_ok());
    }

    #[test]
    fn test_save_replaces_previous() {
        let db = Database::open_in_memory().unwrap();
        db.save_catalog_cache("<Catalog/>", 0).unwrap();
        db.save_catalog_cache("<Catalog><Lens id=\"1\"/></Catalog>", 1).unwrap();

        let loaded = db.load_catalog_cache().unwrap().unwrap();
        assert_eq!(loaded.lens_count, 1);

        assert!(db.clear_catalog_cache().unwrap());
        assert_eq!(db.load_catalog_cache().unwrap(), None);
    }
}

//! SQLite schema definition.

/// Complete database schema for the IOL catalog core.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Lens Overrides (sparse patches, independent of catalog refreshes)
-- ============================================================================

CREATE TABLE IF NOT EXISTS lens_overrides (
    lens_id TEXT PRIMARY KEY,
    patch TEXT NOT NULL,                         -- JSON LensPatch
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Catalog Cache (last successfully normalized document)
-- ============================================================================

-- Single row, replaced atomically
CREATE TABLE IF NOT EXISTS catalog_cache (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    document TEXT NOT NULL,
    content_hash TEXT NOT NULL,                  -- SHA-256 hex of document
    lens_count INTEGER NOT NULL,
    cached_at TEXT NOT NULL                      -- RFC 3339
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_cache_single_row_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO catalog_cache (id, document, content_hash, lens_count, cached_at) VALUES (2, '', '', 0, '')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO catalog_cache (id, document, content_hash, lens_count, cached_at) VALUES (1, '', '', 0, '')",
            [],
        );
        assert!(result.is_ok());
    }
}

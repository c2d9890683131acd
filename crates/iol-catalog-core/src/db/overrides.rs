//! Override database operations.

use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{Database, DbError, DbResult};
use crate::overrides::{LensPatch, OverrideMap};

impl Database {
    /// Insert or replace the override for one lens.
    pub fn upsert_override(&self, lens_id: &str, patch: &LensPatch) -> DbResult<()> {
        let patch_json = serde_json::to_string(patch)?;

        self.conn.execute(
            r#"
            INSERT INTO lens_overrides (lens_id, patch, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(lens_id) DO UPDATE SET
                patch = excluded.patch,
                updated_at = datetime('now')
            "#,
            params![lens_id, patch_json],
        )?;
        Ok(())
    }

    /// Get the override for one lens.
    pub fn get_override(&self, lens_id: &str) -> DbResult<Option<LensPatch>> {
        let patch_json: Option<String> = self
            .conn
            .query_row(
                "SELECT patch FROM lens_overrides WHERE lens_id = ?",
                [lens_id],
                |row| row.get(0),
            )
            .optional()?;

        patch_json
            .map(|json| serde_json::from_str(&json).map_err(DbError::from))
            .transpose()
    }

    /// Delete the override for one lens, reverting it to the catalog value.
    ///
    /// Fails with [`DbError::NotFound`] when the lens has no override.
    pub fn delete_override(&self, lens_id: &str) -> DbResult<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM lens_overrides WHERE lens_id = ?", [lens_id])?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("override for lens {lens_id}")));
        }
        Ok(())
    }

    /// Load every override. A stored patch that no longer deserializes is
    /// skipped and logged so the remaining overrides still apply.
    pub fn load_overrides(&self) -> DbResult<OverrideMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT lens_id, patch FROM lens_overrides ORDER BY lens_id")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut overrides = OverrideMap::new();
        for row in rows {
            let (lens_id, patch_json) = row?;
            match serde_json::from_str(&patch_json) {
                Ok(patch) => {
                    overrides.insert(lens_id, patch);
                }
                Err(error) => warn!(%lens_id, %error, "Skipping unreadable override"),
            }
        }
        Ok(overrides)
    }

    /// Replace every override in one transaction.
    pub fn replace_overrides(&mut self, overrides: &OverrideMap) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM lens_overrides", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO lens_overrides (lens_id, patch, updated_at) VALUES (?1, ?2, datetime('now'))",
            )?;
            for (lens_id, patch) in overrides {
                let patch_json = serde_json::to_string(patch)?;
                stmt.execute(params![lens_id, patch_json])?;
            }
        }
        tx.commit()?;

        info!(count = overrides.len(), "Override map replaced");
        Ok(())
    }
}

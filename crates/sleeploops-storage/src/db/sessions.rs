use anyhow::Result;
use rusqlite::params;

use super::Database;
use crate::models::SleepSession;

impl Database {
    // ==================== Session Methods ====================

    /// List all sessions in insertion order
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn list_sessions(&self) -> Result<Vec<SleepSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, start, \"end\", auto_detected
             FROM sessions
             ORDER BY id ASC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(SleepSession {
                    id: row.get(0)?,
                    start: row.get(1)?,
                    end: row.get(2)?,
                    auto_detected: row.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Insert a session and return its generated id
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn insert_session(&self, start: i64, end: Option<i64>, auto_detected: bool) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (start, \"end\", auto_detected) VALUES (?1, ?2, ?3)",
            params![start, end, i32::from(auto_detected)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Set the end timestamp of a session
    ///
    /// # Errors
    ///
    /// Returns an error if the database update operation fails
    pub fn update_session_end(&self, id: i64, end: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sessions SET \"end\" = ?1 WHERE id = ?2",
            params![end, id],
        )?;
        if updated == 0 {
            log::warn!("No session with id {id} to close");
        }
        Ok(())
    }

    /// Delete a session
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn delete_session(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Drop every stored session
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete operation fails
    pub fn drop_all_sessions(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions", [])?;
        Ok(deleted)
    }
}

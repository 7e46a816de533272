use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Database;

impl Database {
    // ==================== Preference Methods ====================

    /// Read a preference value
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite a preference value
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a preference
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails
    pub fn remove_preference(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// List preferences whose key starts with `prefix`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn preferences_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM preferences WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove every preference
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails
    pub fn clear_preferences(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM preferences", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn test_preference_roundtrip_and_overwrite() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_preference("sleepThreshold").unwrap(), None);

        db.set_preference("sleepThreshold", "30").unwrap();
        db.set_preference("sleepThreshold", "45").unwrap();
        assert_eq!(
            db.get_preference("sleepThreshold").unwrap().as_deref(),
            Some("45")
        );

        db.remove_preference("sleepThreshold").unwrap();
        assert_eq!(db.get_preference("sleepThreshold").unwrap(), None);
    }

    #[test]
    fn test_prefix_listing_and_clear() {
        let db = Database::open_in_memory().unwrap();
        db.set_preference("schedule:1", "a").unwrap();
        db.set_preference("schedule:3", "b").unwrap();
        db.set_preference("lastActiveTime", "c").unwrap();

        let scheduled = db.preferences_with_prefix("schedule:").unwrap();
        assert_eq!(
            scheduled,
            vec![
                ("schedule:1".to_string(), "a".to_string()),
                ("schedule:3".to_string(), "b".to_string()),
            ]
        );

        db.clear_preferences().unwrap();
        assert_eq!(db.get_preference("lastActiveTime").unwrap(), None);
    }
}

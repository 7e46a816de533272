use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if table creation or a column migration fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Sessions table - one row per sleep interval
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start INTEGER NOT NULL,
            \"end\" INTEGER,
            auto_detected INTEGER DEFAULT 0
        )",
        [],
    )?;

    // Older installs created sessions without the auto_detected flag.
    // Add the column in place so existing rows survive.
    let columns_to_add = vec![("auto_detected", "INTEGER DEFAULT 0")];

    for (column_name, column_type) in columns_to_add {
        if !column_exists(conn, "sessions", column_name)? {
            conn.execute(
                &format!("ALTER TABLE sessions ADD COLUMN {column_name} {column_type}"),
                [],
            )?;
            log::info!("Added {column_name} column to sessions table");
        }
    }

    // Preferences table - key-value store for runtime settings
    conn.execute(
        "CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start)",
        [],
    )?;

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

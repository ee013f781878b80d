use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            pain_level INTEGER NOT NULL CHECK (pain_level BETWEEN 0 AND 10),
            notes TEXT NOT NULL DEFAULT '',
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, date)
        ) WITHOUT ROWID;
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}

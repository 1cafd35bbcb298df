use anyhow::{Context, Result};
use directories::ProjectDirs;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Returns the path to the shared morchess database.
/// Location: `~/.local/share/morchess/morchess.db` (XDG-compliant)
pub fn db_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "morchess").context("Could not determine data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("morchess.db"))
}

/// Opens (or creates) the shared SQLite database in the data directory.
pub fn open_db() -> Result<Connection> {
    let path = db_path()?;
    open_db_at(&path)
}

/// Opens (or creates) a SQLite database at an explicit path.
/// Enables WAL mode so a second workbench window can read while one writes.
pub fn open_db_at(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(conn)
}

/// Open an in-memory database for testing.
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_db_at_creates_file() {
        let path = std::env::temp_dir().join(format!("morchess-db-test-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let conn = open_db_at(&path).unwrap();
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        drop(conn);
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_memory_db_enables_foreign_keys() {
        let conn = open_memory_db().unwrap();
        let on: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}

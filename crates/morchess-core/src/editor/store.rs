use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

// ── Persisted record ─────────────────────────────────────────────────

/// What `:w` writes and `load()` reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedProgram {
    pub program: String,
    pub i_cursor: usize,
    pub i_line: usize,
    pub camera_y: usize,
}

impl PersistedProgram {
    /// The record used when nothing has been saved under a name yet.
    pub fn initial(placeholder: &str) -> Self {
        Self {
            program: placeholder.to_string(),
            i_cursor: 0,
            i_line: 0,
            camera_y: 0,
        }
    }
}

/// Key-value persistence for programs.
pub trait ProgramStore {
    fn load(&self, name: &str) -> Result<Option<PersistedProgram>>;
    fn save(&mut self, name: &str, record: &PersistedProgram) -> Result<()>;
}

// ── SQLite ───────────────────────────────────────────────────────────

/// Initialize the `programs` table.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            program TEXT NOT NULL DEFAULT '',
            i_cursor INTEGER NOT NULL DEFAULT 0,
            i_line INTEGER NOT NULL DEFAULT 0,
            camera_y INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TRIGGER IF NOT EXISTS programs_updated_at
        AFTER UPDATE ON programs
        BEGIN
            UPDATE programs SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
        END;",
    )?;
    Ok(())
}

fn to_sql_index(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_index(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Get a program by name.
pub fn get_program(conn: &Connection, name: &str) -> Result<Option<PersistedProgram>> {
    let record = conn
        .query_row(
            "SELECT program, i_cursor, i_line, camera_y FROM programs WHERE name = ?1",
            [name],
            |row| {
                Ok(PersistedProgram {
                    program: row.get(0)?,
                    i_cursor: from_sql_index(row.get(1)?),
                    i_line: from_sql_index(row.get(2)?),
                    camera_y: from_sql_index(row.get(3)?),
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Insert or replace a program (upsert by name).
pub fn upsert_program(conn: &Connection, name: &str, record: &PersistedProgram) -> Result<()> {
    conn.execute(
        "INSERT INTO programs (name, program, i_cursor, i_line, camera_y)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(name) DO UPDATE SET
            program = excluded.program,
            i_cursor = excluded.i_cursor,
            i_line = excluded.i_line,
            camera_y = excluded.camera_y",
        rusqlite::params![
            name,
            record.program,
            to_sql_index(record.i_cursor),
            to_sql_index(record.i_line),
            to_sql_index(record.camera_y),
        ],
    )?;
    Ok(())
}

/// `ProgramStore` backed by the shared SQLite database.
pub struct SqliteProgramStore {
    conn: Connection,
}

impl SqliteProgramStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn).context("Failed to create programs table")?;
        Ok(Self { conn })
    }
}

impl ProgramStore for SqliteProgramStore {
    fn load(&self, name: &str) -> Result<Option<PersistedProgram>> {
        get_program(&self.conn, name).with_context(|| format!("Failed to load program {name:?}"))
    }

    fn save(&mut self, name: &str, record: &PersistedProgram) -> Result<()> {
        upsert_program(&self.conn, name, record)
            .with_context(|| format!("Failed to save program {name:?}"))
    }
}

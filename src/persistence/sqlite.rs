use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::persistence::repository::{SaveRepository, SaveStoreError};

const SAVE_SCHEMA_VERSION: i64 = 1;

const SAVE_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS save_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS save_slots (
  slot TEXT PRIMARY KEY,
  blob TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

/// Save slots in a single SQLite file.
pub struct SqliteSaveStore {
    conn: Connection,
}

impl SqliteSaveStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaveStoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SaveStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SaveStoreError> {
        let store = Self { conn };
        store.conn.execute_batch(SAVE_DB_SCHEMA)?;
        store.ensure_meta()?;
        Ok(store)
    }

    fn ensure_meta(&self) -> Result<(), SaveStoreError> {
        let version = self
            .conn
            .query_row(
                "SELECT schema_version FROM save_meta WHERE id = 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match version {
            Some(SAVE_SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(SaveStoreError::InvalidData(format!(
                "save_meta version mismatch (found {}, expected {})",
                other, SAVE_SCHEMA_VERSION
            ))),
            None => {
                self.conn.execute(
                    "INSERT INTO save_meta (id, schema_version) VALUES (1, ?1)",
                    params![SAVE_SCHEMA_VERSION],
                )?;
                Ok(())
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

impl SaveRepository for SqliteSaveStore {
    fn read_slot(&self, slot: &str) -> Result<Option<String>, SaveStoreError> {
        let blob = self
            .conn
            .query_row(
                "SELECT blob FROM save_slots WHERE slot = ?1",
                params![slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn write_slot(&mut self, slot: &str, blob: &str) -> Result<(), SaveStoreError> {
        self.conn.execute(
            "INSERT INTO save_slots (slot, blob, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(slot) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
            params![slot, blob, now_ms()],
        )?;
        Ok(())
    }

    fn clear_slot(&mut self, slot: &str) -> Result<(), SaveStoreError> {
        self.conn
            .execute("DELETE FROM save_slots WHERE slot = ?1", params![slot])?;
        Ok(())
    }
}

use thiserror::Error;

pub const PRIMARY_SLOT: &str = "save";
pub const BACKUP_SLOT: &str = "save_backup";
pub const HIGH_SCORE_SLOT: &str = "highscores";

#[derive(Debug, Error)]
pub enum SaveStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidData(String),
}

/// Named text blobs. The save system decides what goes in each slot.
pub trait SaveRepository {
    fn read_slot(&self, slot: &str) -> Result<Option<String>, SaveStoreError>;
    fn write_slot(&mut self, slot: &str, blob: &str) -> Result<(), SaveStoreError>;
    fn clear_slot(&mut self, slot: &str) -> Result<(), SaveStoreError>;
}

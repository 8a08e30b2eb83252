pub mod memory;
pub mod repository;
pub mod save_system;
pub mod sqlite;

pub use crate::persistence::memory::MemorySaveStore;
pub use crate::persistence::repository::{SaveRepository, SaveStoreError};
pub use crate::persistence::save_system::SaveSystem;
pub use crate::persistence::sqlite::SqliteSaveStore;

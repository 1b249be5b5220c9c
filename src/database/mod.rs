pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod records;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{MemoryAccessStore, MemoryRecordStore};
pub use postgres::{PgAccessStore, PgRecordStore};
pub use records::RecordStore;

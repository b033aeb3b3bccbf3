pub mod manager;
pub mod memory;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use store::{Record, RecordStore};

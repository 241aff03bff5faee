//! Bulk writes against a collection.
pub mod batch;
pub mod bulk;
pub mod emulator;
pub mod error;
pub mod index_map;
pub mod options;
pub mod results;

pub use self::batch::{DeleteRequest, InsertRequest, UpdateRequest, WriteRequest, WriteRequestType};
pub use self::bulk::BulkMixedWriteOperation;
pub use self::emulator::BulkWriteEmulator;
pub use self::index_map::IndexMap;
pub use self::results::{BulkWriteResult, BulkWriteUpsert};

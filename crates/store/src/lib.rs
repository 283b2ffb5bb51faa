//! Record store boundary and bulk mutations.

pub mod bulk;
pub mod memory;
pub mod store;

pub use bulk::{BulkCoordinator, BulkError, BulkOutcome};
pub use memory::MemoryStore;
pub use store::{RecordStore, StoreError};

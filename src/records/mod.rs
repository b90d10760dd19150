//! The Records interface: messages, indexing and versioning

pub mod indexes;
pub mod query;
pub mod types;
pub mod versioning;
pub mod write;

pub use query::{RecordsQuery, RecordsQueryOptions};
pub use types::{
    DateRange, DateSort, QueryResultEntry, RecordsQueryDescriptor, RecordsQueryFilter,
    RecordsQueryMessage, RecordsWriteDescriptor, RecordsWriteMessage, UnsignedRecordsWriteMessage,
};
pub use write::{CreateFromOptions, RecordsWrite, RecordsWriteOptions};

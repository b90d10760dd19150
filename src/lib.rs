//! dwn-records - Records interface core for a decentralized web node
//!
//! Every record is a chain of signed, content-addressed writes. The node
//! decides which write is the record's current state, prunes superseded
//! writes, and answers queries according to who is asking.
//!
//! ## Architecture
//!
//! - **hashing**: canonical JSON + SHA2-256 CIDs for descriptors, entry ids and payloads
//! - **jws / did / auth**: signed authorization and attestation envelopes, `did:key` resolution
//! - **records**: RecordsWrite and RecordsQuery messages, indexes, versioning
//! - **handlers**: method handlers producing `{status, entries?}` replies
//! - **store**: message index (sled) and payload store (filesystem)
//!
//! ## Identities
//!
//! | Id | Derived from |
//! |----|--------------|
//! | entryId | CID of the descriptor plus `author` |
//! | recordId | entryId of the record's initial write |
//! | contextId | entryId of a protocol root write |
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_dir>/
//! ├── messages.sled/         # Message index, one tree per tenant
//! ├── data/                  # Content-addressed payloads, partitioned by tenant
//! └── config.toml            # Configuration
//! ```

pub mod auth;
pub mod config;
pub mod did;
pub mod dwn;
pub mod error;
pub mod handlers;
pub mod hashing;
pub mod jws;
pub mod message;
pub mod protocols;
pub mod records;
pub mod store;
pub mod telemetry;
pub mod time;

pub use config::DwnConfig;
pub use did::{DidDocument, DidKeyResolver, DidResolver};
pub use dwn::Dwn;
pub use error::{DwnError, Result};
pub use handlers::{MessageReply, Status};
pub use jws::{Ed25519Signer, GeneralJws, Signer};
pub use message::{DwnMessage, Interface, Method};
pub use protocols::{NoProtocolRules, ProtocolAuthorizer};
pub use records::{
    CreateFromOptions, DateSort, RecordsQuery, RecordsQueryFilter, RecordsQueryOptions,
    RecordsWrite, RecordsWriteOptions,
};
pub use store::{DataStore, Filter, FsDataStore, MessageStore, SledMessageStore};

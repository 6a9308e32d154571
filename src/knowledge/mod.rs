//! Knowledge base of vendor API methods.
//!
//! [`KnowledgeStore`] owns the current snapshot, [`QueryEngine`] answers reads
//! against it.

pub mod query;
pub mod store;
pub mod types;

pub use query::{resource_of, QueryEngine};
pub use store::{KnowledgeStore, Snapshot, StoreStatus};
pub use types::{
    compute_source_version, entries_from_value, entries_to_value, parse_method_map,
    MethodEntries, MethodRecord, ParameterSpec,
};

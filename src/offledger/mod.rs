//! Off-ledger storage with per-record expiry.
//! Each (namespace, collection) pair gets its own document database; the
//! provider purges expired records from all of them on a fixed interval.
pub mod collections;
pub mod dbstore;
pub mod dcas;
pub mod engine;
pub mod provider;

pub use collections::{CollectionConfig, CollectionType};
pub use dbstore::{DbStore, KeyValue, Value};
pub use engine::{DocumentDb, DocumentEngine, MemoryEngine};
pub use provider::{db_name, ExpiringStoreProvider};

//! Document store seam and the in-memory engine
//!
//! Off-ledger data lives in a document database: one database per collection,
//! each with a secondary index on the `expiry` field so expired documents can be
//! found without a full scan. [`DocumentEngine`] and [`DocumentDb`] are the
//! narrow interface the provider needs; [`MemoryEngine`] implements it in process.
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PeerExtError, Result};

pub const EXPIRY_FIELD: &str = "expiry";
pub const EXPIRY_INDEX_NAME: &str = "by_expiry";
pub const EXPIRY_INDEX_DOC: &str = "indexExpiry";

/// A stored document. `expiry` is epoch milliseconds; `None` never expires.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub value: Vec<u8>,
    pub tx_id: String,
    pub expiry: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IndexFields {
    pub fields: Vec<String>,
}

/// JSON index definition in the shape document databases accept
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IndexDefinition {
    pub index: IndexFields,
    pub name: String,
    pub ddoc: String,
    #[serde(rename = "type")]
    pub index_type: String,
}

impl IndexDefinition {
    /// Index over the expiry field used by the purge sweep
    pub fn expiry() -> Self {
        Self {
            index: IndexFields {
                fields: vec![EXPIRY_FIELD.to_string()],
            },
            name: EXPIRY_INDEX_NAME.to_string(),
            ddoc: EXPIRY_INDEX_DOC.to_string(),
            index_type: "json".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One open document database
pub trait DocumentDb: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn create_index(&self, index: &IndexDefinition) -> Result<()>;

    /// Insert or replace a document
    fn save(&self, doc: Document) -> Result<()>;

    fn load(&self, id: &str) -> Result<Option<Document>>;

    /// Returns whether a document was removed
    fn remove(&self, id: &str) -> Result<bool>;

    /// Remove the document only if its current expiry is at or before
    /// `cutoff_millis`. A document rewritten since it was found expired is kept.
    fn remove_if_expired(&self, id: &str, cutoff_millis: i64) -> Result<bool>;

    /// Ids of documents whose expiry is at or before `cutoff_millis`, found via
    /// the named index
    fn query_expired(&self, index_name: &str, cutoff_millis: i64) -> Result<Vec<String>>;
}

/// Creates (or opens) databases by name
pub trait DocumentEngine: Send + Sync + std::fmt::Debug {
    fn create_database(&self, name: &str) -> Result<Arc<dyn DocumentDb>>;
}

#[derive(Debug, Default)]
struct MemoryDbState {
    docs: HashMap<String, Document>,
    expiry_index: BTreeSet<(i64, String)>,
    indexes: BTreeSet<String>,
}

#[derive(Debug)]
pub struct MemoryDb {
    name: String,
    state: RwLock<MemoryDbState>,
}

impl MemoryDb {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(MemoryDbState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .docs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentDb for MemoryDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_index(&self, index: &IndexDefinition) -> Result<()> {
        if index.index.fields != [EXPIRY_FIELD] {
            return Err(PeerExtError::Index(format!(
                "[{}] unsupported index fields {:?}",
                self.name, index.index.fields
            )));
        }
        debug!("[{}] Creating index {}", self.name, index.to_json()?);
        self.state.write()?.indexes.insert(index.name.clone());
        Ok(())
    }

    fn save(&self, doc: Document) -> Result<()> {
        let mut guard = self.state.write()?;
        let state = &mut *guard;
        if let Some(old) = state.docs.get(&doc.id).and_then(|d| d.expiry) {
            state.expiry_index.remove(&(old, doc.id.clone()));
        }
        if let Some(expiry) = doc.expiry {
            state.expiry_index.insert((expiry, doc.id.clone()));
        }
        state.docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.read()?.docs.get(id).cloned())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut guard = self.state.write()?;
        let state = &mut *guard;
        match state.docs.remove(id) {
            Some(doc) => {
                if let Some(expiry) = doc.expiry {
                    state.expiry_index.remove(&(expiry, doc.id));
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_if_expired(&self, id: &str, cutoff_millis: i64) -> Result<bool> {
        let mut guard = self.state.write()?;
        let state = &mut *guard;
        let expiry = match state.docs.get(id).and_then(|doc| doc.expiry) {
            Some(expiry) if expiry <= cutoff_millis => expiry,
            _ => return Ok(false),
        };
        state.docs.remove(id);
        state.expiry_index.remove(&(expiry, id.to_string()));
        Ok(true)
    }

    fn query_expired(&self, index_name: &str, cutoff_millis: i64) -> Result<Vec<String>> {
        let state = self.state.read()?;
        if !state.indexes.contains(index_name) {
            return Err(PeerExtError::Index(format!(
                "[{}] no index named {}",
                self.name, index_name
            )));
        }
        Ok(state
            .expiry_index
            .iter()
            .take_while(|(expiry, _)| *expiry <= cutoff_millis)
            .map(|(_, id)| id.clone())
            .collect())
    }
}

/// In-process engine. Databases live as long as the engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    databases: papaya::HashMap<String, Arc<MemoryDb>>,
    created: AtomicUsize,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of databases this engine created. Opening an existing database
    /// does not count.
    pub fn databases_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn database(&self, name: &str) -> Option<Arc<MemoryDb>> {
        self.databases.pin().get(name).cloned()
    }
}

impl DocumentEngine for MemoryEngine {
    fn create_database(&self, name: &str) -> Result<Arc<dyn DocumentDb>> {
        let databases = self.databases.pin();
        // The closure may run and still lose the insert race
        let mut built: Option<Arc<MemoryDb>> = None;
        let db = databases
            .get_or_insert_with(name.to_string(), || {
                let db = Arc::new(MemoryDb::new(name));
                built = Some(db.clone());
                db
            })
            .clone();
        if let Some(built) = built {
            if Arc::ptr_eq(&built, &db) {
                self.created.fetch_add(1, Ordering::SeqCst);
                debug!("Created database {}", name);
            }
        }
        let db: Arc<dyn DocumentDb> = db;
        Ok(db)
    }
}

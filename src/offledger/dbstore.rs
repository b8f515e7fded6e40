use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::dcas;
use super::engine::{Document, DocumentDb, EXPIRY_INDEX_NAME};
use crate::error::Result;
use crate::store_error;

/// A value as seen by readers and writers of an off-ledger collection
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Value {
    pub value: Vec<u8>,
    pub tx_id: String,
    /// Explicit expiry. Writers may leave this empty to use the store's TTL.
    pub expiry: Option<DateTime<Utc>>,
}

impl Value {
    pub fn new(value: impl Into<Vec<u8>>, tx_id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            tx_id: tx_id.into(),
            expiry: None,
        }
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

enum Write<'a> {
    Delete(&'a str),
    Save(Document),
}

/// Store handle for one (namespace, collection) pair
#[derive(Debug)]
pub struct DbStore {
    name: String,
    db: Arc<dyn DocumentDb>,
    ttl: Option<Duration>,
    dcas: bool,
}

impl DbStore {
    pub(crate) fn new(db: Arc<dyn DocumentDb>, name: &str, ttl: Option<Duration>, dcas: bool) -> Self {
        Self {
            name: name.to_string(),
            db,
            ttl,
            dcas,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_dcas(&self) -> bool {
        self.dcas
    }

    /// Write a batch of values. A value with no explicit expiry is stamped with
    /// now + TTL, or never expires if the store has no TTL. An empty value
    /// deletes the key.
    ///
    /// The whole batch is checked before anything is written, so an invalid
    /// entry leaves the store untouched.
    pub fn put(&self, kvs: &[KeyValue]) -> Result<()> {
        let now = Utc::now();
        let writes = kvs
            .iter()
            .map(|kv| self.prepare(kv, now))
            .collect::<Result<Vec<_>>>()?;

        for write in writes {
            match write {
                Write::Delete(key) => self.delete(key)?,
                Write::Save(doc) => self.db.save(doc)?,
            }
        }
        Ok(())
    }

    fn prepare<'a>(&self, kv: &'a KeyValue, now: DateTime<Utc>) -> Result<Write<'a>> {
        if kv.value.value.is_empty() {
            return Ok(Write::Delete(&kv.key));
        }
        if self.dcas {
            dcas::validate(&kv.key, &kv.value.value)?;
        }
        let expiry = match kv.value.expiry {
            Some(expiry) => Some(expiry),
            None => self.expiry_from(now)?,
        };
        Ok(Write::Save(Document {
            id: kv.key.clone(),
            value: kv.value.value.clone(),
            tx_id: kv.value.tx_id.clone(),
            expiry: expiry.map(|t| t.timestamp_millis()),
        }))
    }

    pub fn put_value(&self, key: &str, value: Vec<u8>, tx_id: &str) -> Result<()> {
        self.put(&[KeyValue::new(key, Value::new(value, tx_id))])
    }

    /// Read a key. Expired records are not returned even before the purge
    /// sweep has removed them.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let Some(doc) = self.db.load(key)? else {
            return Ok(None);
        };
        if let Some(expiry) = doc.expiry {
            if expiry <= Utc::now().timestamp_millis() {
                debug!("[{}] Key [{}] has expired", self.name, key);
                return Ok(None);
            }
        }
        Ok(Some(Value {
            value: doc.value,
            tx_id: doc.tx_id,
            expiry: doc.expiry.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }))
    }

    pub fn get_multiple(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Remove every record whose expiry is at or before now. Returns the number
    /// of records removed. A record rewritten after the index query keeps its
    /// new value.
    pub fn delete_expired_keys(&self) -> Result<usize> {
        let cutoff = Utc::now().timestamp_millis();
        let expired = self.db.query_expired(EXPIRY_INDEX_NAME, cutoff)?;
        let mut removed = 0;
        for key in expired {
            if self.db.remove_if_expired(&key, cutoff)? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("[{}] Deleted {} expired keys", self.name, removed);
        }
        Ok(removed)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let Some(ttl) = self.ttl else {
            return Ok(None);
        };
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| store_error!("[{}] invalid TTL {:?}: {}", self.name, ttl, e))?;
        now.checked_add_signed(ttl)
            .map(Some)
            .ok_or_else(|| store_error!("[{}] expiry out of range for TTL {}", self.name, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PeerExtError;
    use crate::offledger::engine::{DocumentEngine, IndexDefinition, MemoryEngine};

    fn new_store(ttl: Option<Duration>, dcas: bool) -> DbStore {
        let engine = MemoryEngine::new();
        let db = engine.create_database("ns$coll").unwrap();
        db.create_index(&IndexDefinition::expiry()).unwrap();
        DbStore::new(db, "ns$coll", ttl, dcas)
    }

    #[test]
    fn put_and_get() {
        let store = new_store(None, false);
        store.put_value("key1", b"value1".to_vec(), "tx1").unwrap();
        let value = store.get("key1").unwrap().unwrap();
        assert_eq!(value.value, b"value1");
        assert_eq!(value.tx_id, "tx1");
        assert_eq!(value.expiry, None);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn put_stamps_ttl() {
        let store = new_store(Some(Duration::from_secs(60)), false);
        let before = Utc::now();
        store.put_value("key1", b"value1".to_vec(), "tx1").unwrap();
        let expiry = store.get("key1").unwrap().unwrap().expiry.unwrap();
        assert!(expiry >= before + chrono::Duration::seconds(59));
        assert!(expiry <= Utc::now() + chrono::Duration::seconds(60));
    }

    #[test]
    fn explicit_expiry_wins() {
        let store = new_store(Some(Duration::from_secs(60)), false);
        let expiry = Utc::now() + chrono::Duration::hours(1);
        store
            .put(&[KeyValue::new("key1", Value::new("v", "tx1").with_expiry(expiry))])
            .unwrap();
        let stored = store.get("key1").unwrap().unwrap().expiry.unwrap();
        assert_eq!(stored.timestamp_millis(), expiry.timestamp_millis());
    }

    #[test]
    fn expired_records_are_hidden_and_purged() {
        let store = new_store(None, false);
        let past = Utc::now() - chrono::Duration::seconds(1);
        store
            .put(&[
                KeyValue::new("old", Value::new("v1", "tx1").with_expiry(past)),
                KeyValue::new("fresh", Value::new("v2", "tx1")),
            ])
            .unwrap();
        assert!(store.get("old").unwrap().is_none());
        assert_eq!(store.delete_expired_keys().unwrap(), 1);
        assert_eq!(store.delete_expired_keys().unwrap(), 0);
        assert!(store.get("fresh").unwrap().is_some());
    }

    #[test]
    fn empty_value_deletes() {
        let store = new_store(None, false);
        store.put_value("key1", b"value1".to_vec(), "tx1").unwrap();
        store.put_value("key1", Vec::new(), "tx2").unwrap();
        assert!(store.get("key1").unwrap().is_none());
    }

    #[test]
    fn get_multiple_preserves_order() {
        let store = new_store(None, false);
        store.put_value("a", b"1".to_vec(), "tx1").unwrap();
        store.put_value("c", b"3".to_vec(), "tx1").unwrap();
        let values = store.get_multiple(&["a", "b", "c"]).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_ref().unwrap().value, b"1");
        assert!(values[1].is_none());
        assert_eq!(values[2].as_ref().unwrap().value, b"3");
    }

    /// Rewrites every expired id right after the index query, the way a
    /// writer racing the sweep would.
    #[derive(Debug)]
    struct RewritingDb(Arc<dyn DocumentDb>);

    impl DocumentDb for RewritingDb {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn create_index(&self, index: &IndexDefinition) -> Result<()> {
            self.0.create_index(index)
        }
        fn save(&self, doc: Document) -> Result<()> {
            self.0.save(doc)
        }
        fn load(&self, id: &str) -> Result<Option<Document>> {
            self.0.load(id)
        }
        fn remove(&self, id: &str) -> Result<bool> {
            self.0.remove(id)
        }
        fn remove_if_expired(&self, id: &str, cutoff_millis: i64) -> Result<bool> {
            self.0.remove_if_expired(id, cutoff_millis)
        }
        fn query_expired(&self, index_name: &str, cutoff_millis: i64) -> Result<Vec<String>> {
            let ids = self.0.query_expired(index_name, cutoff_millis)?;
            let later = (Utc::now() + chrono::Duration::hours(1)).timestamp_millis();
            for id in &ids {
                self.0.save(Document {
                    id: id.clone(),
                    value: b"refreshed".to_vec(),
                    tx_id: "tx2".to_string(),
                    expiry: Some(later),
                })?;
            }
            Ok(ids)
        }
    }

    #[test]
    fn sweep_keeps_records_rewritten_after_query() {
        let engine = MemoryEngine::new();
        let inner = engine.create_database("ns$coll").unwrap();
        inner.create_index(&IndexDefinition::expiry()).unwrap();
        let store = DbStore::new(Arc::new(RewritingDb(inner)), "ns$coll", None, false);

        let past = Utc::now() - chrono::Duration::seconds(1);
        store
            .put(&[KeyValue::new("k", Value::new("stale", "tx1").with_expiry(past))])
            .unwrap();

        assert_eq!(store.delete_expired_keys().unwrap(), 0);
        let value = store.get("k").unwrap().unwrap();
        assert_eq!(value.value, b"refreshed");
        assert_eq!(value.tx_id, "tx2");
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let store = new_store(None, true);
        store.put_value(&dcas::cas_key(b"old"), b"old".to_vec(), "tx0").unwrap();

        let good = dcas::cas_key(b"a");
        let result = store.put(&[
            KeyValue::new(good.clone(), Value::new("a", "tx1")),
            KeyValue::new(dcas::cas_key(b"old"), Value::new(Vec::<u8>::new(), "tx1")),
            KeyValue::new("bogus", Value::new("b", "tx1")),
        ]);
        assert!(matches!(result, Err(PeerExtError::InvalidKey(_))));
        assert!(store.get(&good).unwrap().is_none());
        assert!(store.get(&dcas::cas_key(b"old")).unwrap().is_some());
    }

    #[test]
    fn dcas_store_checks_keys() {
        let store = new_store(None, true);
        let key = dcas::cas_key(b"content");
        store.put_value(&key, b"content".to_vec(), "tx1").unwrap();
        assert!(store.get(&key).unwrap().is_some());
        assert!(matches!(
            store.put_value("not-a-hash", b"content".to_vec(), "tx1"),
            Err(PeerExtError::InvalidKey(_))
        ));
    }
}

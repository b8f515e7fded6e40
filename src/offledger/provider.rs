//! Expiring store provider
//!
//! Hands out one [`DbStore`] per (namespace, collection), creating it and its
//! expiry index on first use, and runs a background task that periodically
//! deletes expired records from every open store.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use super::collections::CollectionConfig;
use super::dbstore::DbStore;
use super::engine::{DocumentEngine, IndexDefinition};
use crate::config_error;
use crate::error::{PeerExtError, Result};
use crate::settings::OffLedgerSettings;

type StoreRegistry = Arc<RwLock<HashMap<String, Arc<DbStore>>>>;

/// Name of the underlying database for a collection
pub fn db_name(ns: &str, coll: &str) -> String {
    format!("{}${}", ns, coll)
}

pub struct ExpiringStoreProvider {
    engine: Arc<dyn DocumentEngine>,
    stores: StoreRegistry,
    default_ttl: Option<Duration>,
    shutdown_tx: watch::Sender<bool>,
    closed: AtomicBool,
    purge_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ExpiringStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStoreProvider")
            .field("engine", &self.engine)
            .field("default_ttl", &self.default_ttl)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ExpiringStoreProvider {
    /// Create a provider and start its purge task. Must be called from within
    /// a Tokio runtime.
    pub fn new(engine: Arc<dyn DocumentEngine>, settings: &OffLedgerSettings) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| config_error!("store provider requires a Tokio runtime: {}", e))?;
        let period = settings.expiration_check_interval;
        if period.is_zero() {
            return Err(config_error!("expiration check interval must be greater than zero"));
        }

        let stores: StoreRegistry = Arc::new(RwLock::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let purge_task = runtime.spawn(Self::periodic_purge(stores.clone(), period, shutdown_rx));
        info!(
            "Started off-ledger store provider (check interval {:?}, default TTL {:?})",
            period, settings.default_ttl
        );

        Ok(Self {
            engine,
            stores,
            default_ttl: settings.default_ttl,
            shutdown_tx,
            closed: AtomicBool::new(false),
            purge_task: Mutex::new(Some(purge_task)),
        })
    }

    /// Store for `ns`/`coll` using the provider's default TTL
    pub fn get_db(&self, ns: &str, coll: &str) -> Result<Arc<DbStore>> {
        self.resolve(ns, coll, self.default_ttl, false)
    }

    /// Store for a configured collection. The collection's TTL and type apply
    /// if this call creates the store.
    pub fn open_collection(&self, ns: &str, config: &CollectionConfig) -> Result<Arc<DbStore>> {
        config.validate()?;
        self.resolve(ns, &config.name, config.ttl()?, config.is_dcas())
    }

    fn resolve(
        &self,
        ns: &str,
        coll: &str,
        ttl: Option<Duration>,
        dcas: bool,
    ) -> Result<Arc<DbStore>> {
        if self.is_closed() {
            return Err(PeerExtError::Closed);
        }
        let name = db_name(ns, coll);

        if let Some(store) = self.stores.read()?.get(&name) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write()?;
        if let Some(store) = stores.get(&name) {
            return Ok(store.clone());
        }
        // close() flips the flag under this lock
        if self.is_closed() {
            return Err(PeerExtError::Closed);
        }

        let db = self.engine.create_database(&name).map_err(|e| {
            error!("Failed to create database [{}]: {}", name, e);
            PeerExtError::StoreUnavailable(format!("[{}] {}", name, e))
        })?;
        db.create_index(&IndexDefinition::expiry()).map_err(|e| match e {
            PeerExtError::Index(_) => e,
            other => PeerExtError::Index(format!("[{}] {}", name, other)),
        })?;

        let store = Arc::new(DbStore::new(db, &name, ttl, dcas));
        stores.insert(name, store.clone());
        debug!("Registered off-ledger store [{}]", store.name());
        Ok(store)
    }

    /// Snapshot of every registered store
    pub fn stores(&self) -> Result<Vec<Arc<DbStore>>> {
        Self::snapshot(&self.stores)
    }

    /// Run one purge sweep on the calling thread. Returns the number of
    /// records removed.
    pub fn purge_now(&self) -> Result<usize> {
        Ok(purge_expired(&self.stores()?))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the purge task and refuse new stores. Safe to call repeatedly
    /// and from several threads; only the first call signals the task.
    pub fn close(&self) {
        let _registry = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown_tx.send_replace(true);
        info!("Closing off-ledger store provider");
    }

    /// Close and wait for the purge task to exit
    pub async fn shutdown(&self) -> Result<()> {
        self.close();
        let task = self.purge_task.lock()?.take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                PeerExtError::Concurrency(format!("purge task failed: {}", e))
            })?;
        }
        Ok(())
    }

    fn snapshot(stores: &StoreRegistry) -> Result<Vec<Arc<DbStore>>> {
        Ok(stores.read()?.values().cloned().collect())
    }

    async fn periodic_purge(
        stores: StoreRegistry,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = match Self::snapshot(&stores) {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            error!("Unable to list off-ledger stores: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = tokio::task::spawn_blocking(move || purge_expired(&snapshot)).await {
                        error!("Purge sweep panicked: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Periodic purge is exiting");
                        return;
                    }
                }
            }
        }
    }
}

impl Drop for ExpiringStoreProvider {
    fn drop(&mut self) {
        self.close();
    }
}

/// Delete expired keys from each store. A failing store is logged and skipped.
pub fn purge_expired(stores: &[Arc<DbStore>]) -> usize {
    let mut removed = 0;
    for store in stores {
        match store.delete_expired_keys() {
            Ok(n) => removed += n,
            Err(e) => error!("Error deleting expired keys for [{}]: {}", store.name(), e),
        }
    }
    removed
}

//! Durable route table keyed by route id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::routing::Route;
use crate::store::kv::{KeyValueStore, MemoryStore};
use crate::store::{StoreError, NAMESPACE};

const ROUTES_KEY: &str = "routes";

pub type RouteMap = HashMap<String, Route>;

/// Route table persisted as one blob in a [`KeyValueStore`].
///
/// Readers get the current snapshot without locking and never observe a
/// table mid-mutation. Writers are serialized and publish a fresh snapshot
/// only after the blob has been persisted.
pub struct RouteStore {
    kv: Arc<dyn KeyValueStore>,
    snapshot: ArcSwap<RouteMap>,
    write_lock: Mutex<()>,
}

impl RouteStore {
    /// Load the table from `kv`; a missing blob is an empty table.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let routes: RouteMap = match kv.get(NAMESPACE, ROUTES_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => RouteMap::new(),
        };

        tracing::debug!(routes = routes.len(), "Route table loaded");

        Ok(Self {
            kv,
            snapshot: ArcSwap::from_pointee(routes),
            write_lock: Mutex::new(()),
        })
    }

    /// Empty table backed by a [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(MemoryStore::new()),
            snapshot: ArcSwap::from_pointee(RouteMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// The whole table as one consistent snapshot.
    pub fn get_all(&self) -> Arc<RouteMap> {
        self.snapshot.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Route> {
        self.snapshot.load().get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.snapshot.load().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the route stored under `id`.
    ///
    /// Replacement is a single snapshot swap, so no reader sees the id absent
    /// in between.
    pub fn put(&self, id: &str, route: Route) -> Result<(), StoreError> {
        self.write(|routes| {
            routes.insert(id.to_string(), route);
        })
    }

    /// Returns whether an entry existed and was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.write(|routes| routes.remove(id).is_some())
    }

    fn write<R>(&self, mutate: impl FnOnce(&mut RouteMap) -> R) -> Result<R, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut routes = RouteMap::clone(&self.snapshot.load());
        let result = mutate(&mut routes);

        self.kv
            .set(NAMESPACE, ROUTES_KEY, serde_json::to_value(&routes)?)?;
        self.snapshot.store(Arc::new(routes));

        Ok(result)
    }
}

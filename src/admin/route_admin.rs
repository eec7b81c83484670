//! Route administration.
//!
//! Every write goes through here: raw operator input is normalized and
//! validated, persisted through the [`RouteStore`], and announced on a watch
//! channel so the host can rebuild its live registrations.

use std::sync::Arc;

use tokio::sync::watch;

use crate::admin::error::AdminError;
use crate::admin::normalize::{normalize_method, normalize_path, normalize_url, validate_source_path};
use crate::observability::metrics;
use crate::routing::{HostRoutes, Route};
use crate::store::RouteStore;

pub struct RouteAdmin {
    store: Arc<RouteStore>,
    host: Arc<dyn HostRoutes>,
    reserved_prefix: String,
    changes: watch::Sender<u64>,
}

impl RouteAdmin {
    pub fn new(store: Arc<RouteStore>, host: Arc<dyn HostRoutes>, reserved_prefix: impl Into<String>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            store,
            host,
            reserved_prefix: reserved_prefix.into(),
            changes,
        }
    }

    pub fn reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }

    /// Receiver for table-changed notifications; the value is the table version.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }

    pub fn create(
        &self,
        id: &str,
        source_path: &str,
        target_url: &str,
        request_method: &str,
    ) -> Result<Route, AdminError> {
        let route = self.save(id, source_path, target_url, request_method)?;
        tracing::info!(route_id = %id, source_path = %route.source_path, method = %route.request_method, "Route created");
        Ok(route)
    }

    /// Full replacement of the record under `id`.
    pub fn update(
        &self,
        id: &str,
        source_path: &str,
        target_url: &str,
        request_method: &str,
    ) -> Result<Route, AdminError> {
        let route = self.save(id, source_path, target_url, request_method)?;
        tracing::info!(route_id = %id, source_path = %route.source_path, method = %route.request_method, "Route updated");
        Ok(route)
    }

    /// Idempotent; returns whether a route was removed.
    pub fn delete(&self, id: &str) -> Result<bool, AdminError> {
        let removed = self.store.remove(id)?;
        if removed {
            tracing::info!(route_id = %id, "Route deleted");
            self.announce();
        } else {
            tracing::debug!(route_id = %id, "Delete of unknown route ignored");
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Route, AdminError> {
        self.store
            .get(id)
            .ok_or_else(|| AdminError::NotFound(id.to_string()))
    }

    /// All routes ordered by id.
    pub fn list(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.store.get_all().values().cloned().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    fn save(
        &self,
        id: &str,
        source_path: &str,
        target_url: &str,
        request_method: &str,
    ) -> Result<Route, AdminError> {
        let result = self.build(id, source_path, target_url, request_method);
        let route = match result {
            Ok(route) => route,
            Err(e) => {
                tracing::warn!(route_id = %id, error = %e, "Rejected route");
                return Err(e);
            }
        };

        self.warn_collisions(&route);
        self.store.put(id, route.clone())?;
        self.announce();
        Ok(route)
    }

    fn build(
        &self,
        id: &str,
        source_path: &str,
        target_url: &str,
        request_method: &str,
    ) -> Result<Route, AdminError> {
        let path = normalize_path(source_path);
        let url = normalize_url(target_url)?;
        let method = normalize_method(request_method)?;
        let pattern = validate_source_path(&path, &self.reserved_prefix)?;

        Ok(Route::new(id, &pattern, url.as_str(), method))
    }

    fn warn_collisions(&self, route: &Route) {
        for claimed in self.host.claimed_patterns() {
            if claimed.owner.as_deref() == Some(route.id.as_str()) {
                continue;
            }
            if overlaps(&claimed.pattern, &route.source_path) {
                tracing::warn!(
                    route_id = %route.id,
                    source_path = %route.source_path,
                    existing = %claimed.pattern,
                    existing_route = ?claimed.owner,
                    "Source path overlaps an existing host route"
                );
            }
        }
    }

    fn announce(&self) {
        self.changes.send_modify(|version| *version += 1);
        metrics::record_table_size(self.store.len());
    }
}

/// Whether one pattern is a segment-wise prefix of the other. Dynamic
/// segments are treated as matching anything.
fn overlaps(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split('/').filter(|s| !s.is_empty()).collect();
    let b: Vec<&str> = b.split('/').filter(|s| !s.is_empty()).collect();

    for (x, y) in a.iter().zip(b.iter()) {
        if x.starts_with('*') || y.starts_with('*') {
            return true;
        }
        if x != y && !x.starts_with(':') && !y.starts_with(':') {
            return false;
        }
    }
    true
}

//! Live dispatch table of the host server.
//!
//! The server has a handful of fixed routes (the admin API) plus one dynamic
//! registration per stored route. Dynamic registrations are compiled into one
//! `matchit` router per HTTP method and swapped in atomically whenever the
//! route table changes.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::Method;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::routing::pattern::{PathPattern, Segment, SegmentValues};
use crate::routing::route::{RequestMethod, Route};
use crate::store::RouteStore;

/// A path pattern the host already serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedPattern {
    pub pattern: String,
    /// Route id for dynamic registrations, `None` for fixed host routes.
    pub owner: Option<String>,
}

/// What the host knows about its own routing, for collision warnings.
pub trait HostRoutes: Send + Sync {
    fn claimed_patterns(&self) -> Vec<ClaimedPattern>;
}

/// Result of a live lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMatch {
    pub route_id: String,
    pub source_path: String,
    pub values: SegmentValues,
}

#[derive(Debug)]
struct Registration {
    route_id: String,
    source_path: String,
    pattern: PathPattern,
}

#[derive(Default)]
struct LiveTable {
    version: u64,
    routers: HashMap<RequestMethod, matchit::Router<Arc<Registration>>>,
    claimed: Vec<ClaimedPattern>,
}

pub struct LiveRoutes {
    fixed: Vec<String>,
    table: ArcSwap<LiveTable>,
}

impl LiveRoutes {
    /// `fixed` are the host's own patterns (e.g. `/admin/routes`).
    pub fn new(fixed: Vec<String>) -> Self {
        Self {
            fixed,
            table: ArcSwap::from_pointee(LiveTable::default()),
        }
    }

    /// Version of the route table the live registrations were built from.
    pub fn version(&self) -> u64 {
        self.table.load().version
    }

    /// Re-register every route. Conflicting registrations are skipped with a warning.
    pub fn refresh(&self, routes: &[Route], version: u64) {
        let mut ordered: Vec<&Route> = routes.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut routers: HashMap<RequestMethod, matchit::Router<Arc<Registration>>> = HashMap::new();
        let mut claimed = Vec::with_capacity(ordered.len());

        for route in ordered {
            let pattern = match PathPattern::parse(&route.source_path) {
                Ok(pattern) => pattern,
                Err(e) => {
                    tracing::warn!(route_id = %route.id, error = %e, "Skipping route with invalid source path");
                    continue;
                }
            };

            let registration = Arc::new(Registration {
                route_id: route.id.clone(),
                source_path: route.source_path.clone(),
                pattern,
            });
            let router = routers.entry(route.request_method).or_default();

            match router.insert(registration.pattern.to_router_syntax(), registration.clone()) {
                Ok(()) => claimed.push(ClaimedPattern {
                    pattern: route.source_path.clone(),
                    owner: Some(route.id.clone()),
                }),
                Err(e) => tracing::warn!(
                    route_id = %route.id,
                    source_path = %route.source_path,
                    method = %route.request_method,
                    error = %e,
                    "Route conflicts with an existing registration, skipping"
                ),
            }
        }

        tracing::info!(routes = claimed.len(), version, "Live routes refreshed");

        self.table.store(Arc::new(LiveTable {
            version,
            routers,
            claimed,
        }));
    }

    /// Match an inbound request against the dynamic registrations.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<LiveMatch> {
        let method = RequestMethod::from_http(method)?;
        let table = self.table.load();
        let matched = table.routers.get(&method)?.at(path).ok()?;

        let registration = matched.value;
        let values = registration
            .pattern
            .segments()
            .iter()
            .filter_map(|segment| {
                let name = match segment {
                    Segment::Param(name) | Segment::Wildcard(name) => name,
                    Segment::Literal(_) => return None,
                };
                let value = matched.params.get(name)?;
                Some((segment.token()?, value.to_string()))
            })
            .collect();

        Some(LiveMatch {
            route_id: registration.route_id.clone(),
            source_path: registration.source_path.clone(),
            values,
        })
    }

    /// Rebuild the registrations whenever `changes` announces a new table version.
    pub fn spawn_refresher(
        self: Arc<Self>,
        store: Arc<RouteStore>,
        mut changes: watch::Receiver<u64>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let version = *changes.borrow_and_update();
                        let routes: Vec<Route> = store.get_all().values().cloned().collect();
                        self.refresh(&routes, version);
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Live route refresher stopped");
        })
    }
}

impl HostRoutes for LiveRoutes {
    fn claimed_patterns(&self) -> Vec<ClaimedPattern> {
        let table = self.table.load();
        self.fixed
            .iter()
            .map(|pattern| ClaimedPattern {
                pattern: pattern.clone(),
                owner: None,
            })
            .chain(table.claimed.iter().cloned())
            .collect()
    }
}

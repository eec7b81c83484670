//! Route lookup over the stored table.

use std::sync::Arc;

use crate::routing::pattern::{PathPattern, SegmentValues};
use crate::routing::route::{RequestMethod, Route};
use crate::store::RouteStore;

/// Read-only view of the route table with path-matching semantics.
///
/// This is not the host's dispatch router: by the time it is consulted the
/// host has already matched the request and extracted segment values, and
/// the proxy only needs the full route record back.
#[derive(Clone)]
pub struct RouteTable {
    store: Arc<RouteStore>,
}

impl RouteTable {
    pub fn new(store: Arc<RouteStore>) -> Self {
        Self { store }
    }

    /// All routes, in no particular order.
    pub fn find_all(&self) -> Vec<Route> {
        self.store.get_all().values().cloned().collect()
    }

    /// The route whose source path is `path` once the extracted `values` are
    /// put back in place of their tokens.
    pub fn find_by_path(&self, path: &str, values: &SegmentValues) -> Option<Route> {
        self.find(path, values, |_| true)
    }

    /// Like [`find_by_path`](Self::find_by_path), restricted to `method`.
    pub fn find_for_request(
        &self,
        method: RequestMethod,
        path: &str,
        values: &SegmentValues,
    ) -> Option<Route> {
        self.find(path, values, |route| route.request_method == method)
    }

    /// The route the host matched, fetched by id.
    ///
    /// Returns `None` when the record is gone or no longer agrees with the
    /// request (changed method or source path since the host registered it).
    pub fn find_matched(
        &self,
        id: &str,
        method: RequestMethod,
        path: &str,
        values: &SegmentValues,
    ) -> Option<Route> {
        let route = self.store.get(id)?;
        if route.request_method != method {
            return None;
        }
        match PathPattern::parse(&route.source_path) {
            Ok(pattern) if pattern.matches(path, values) => Some(route),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(route_id = %route.id, error = %e, "Stored route has an invalid source path");
                None
            }
        }
    }

    fn find(
        &self,
        path: &str,
        values: &SegmentValues,
        accept: impl Fn(&Route) -> bool,
    ) -> Option<Route> {
        let routes = self.store.get_all();
        routes
            .values()
            .filter(|route| accept(route))
            .find(|route| match PathPattern::parse(&route.source_path) {
                Ok(pattern) => pattern.matches(path, values),
                Err(e) => {
                    tracing::warn!(route_id = %route.id, error = %e, "Stored route has an invalid source path");
                    false
                }
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(routes: &[(&str, &str, &str, RequestMethod)]) -> RouteTable {
        let store = Arc::new(RouteStore::in_memory());
        for (id, path, target, method) in routes {
            let route = Route::new(*id, &PathPattern::parse(path).unwrap(), *target, *method);
            store.put(id, route).unwrap();
        }
        RouteTable::new(store)
    }

    #[test]
    fn find_all_empty_and_non_empty() {
        assert!(table_with(&[]).find_all().is_empty());

        let table = table_with(&[("1", "/test", "http://localhost:8080/test", RequestMethod::Get)]);
        let all = table.find_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "1");
    }

    #[test]
    fn find_by_exact_path() {
        let table = table_with(&[("1", "/test", "http://localhost:8080/test", RequestMethod::Get)]);
        let none = SegmentValues::new();

        assert_eq!(table.find_by_path("/test", &none).unwrap().id, "1");
        assert!(table.find_by_path("/other", &none).is_none());
        assert!(table.find_by_path("/test/deeper", &none).is_none());
    }

    #[test]
    fn find_by_wildcard_path() {
        let table = table_with(&[(
            "css",
            "/css/*wildcard",
            "http://upstream/css/*wildcard",
            RequestMethod::Get,
        )]);
        let values = SegmentValues::from([("*wildcard".to_string(), "app/theme.css".to_string())]);

        let route = table.find_by_path("/css/app/theme.css", &values).unwrap();
        assert_eq!(route.id, "css");
        assert!(table
            .find_by_path("/css/app/theme.css", &SegmentValues::new())
            .is_none());
    }

    #[test]
    fn find_for_request_respects_method() {
        let table = table_with(&[
            ("read", "/items", "http://localhost/items", RequestMethod::Get),
            ("write", "/items", "http://localhost/items/new", RequestMethod::Post),
        ]);
        let none = SegmentValues::new();

        assert_eq!(
            table.find_for_request(RequestMethod::Post, "/items", &none).unwrap().id,
            "write"
        );
        assert_eq!(
            table.find_for_request(RequestMethod::Get, "/items", &none).unwrap().id,
            "read"
        );
        assert!(table.find_for_request(RequestMethod::Put, "/items", &none).is_none());
    }

    #[test]
    fn find_matched_follows_the_host_match() {
        let table = table_with(&[
            ("a", "/x", "http://a/x", RequestMethod::Get),
            ("b", "/x", "http://b/x", RequestMethod::Get),
            ("c", "/x", "http://c/x", RequestMethod::Get),
            ("d", "/x", "http://d/x", RequestMethod::Get),
        ]);
        let none = SegmentValues::new();

        for _ in 0..20 {
            let route = table.find_matched("a", RequestMethod::Get, "/x", &none).unwrap();
            assert_eq!(route.target_url, "http://a/x");
        }
        assert_eq!(
            table.find_matched("c", RequestMethod::Get, "/x", &none).unwrap().target_url,
            "http://c/x"
        );
    }

    #[test]
    fn find_matched_rejects_stale_registrations() {
        let table = table_with(&[("1", "/users/:id", "http://up/u/:id", RequestMethod::Get)]);
        let bound = SegmentValues::from([(":id".to_string(), "7".to_string())]);

        assert!(table.find_matched("1", RequestMethod::Get, "/users/7", &bound).is_some());
        assert!(table.find_matched("1", RequestMethod::Post, "/users/7", &bound).is_none());
        assert!(table.find_matched("1", RequestMethod::Get, "/items/7", &bound).is_none());
        assert!(table.find_matched("2", RequestMethod::Get, "/users/7", &bound).is_none());
    }
}

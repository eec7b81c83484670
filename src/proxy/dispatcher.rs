//! One proxy round trip per matched route.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header::CONTENT_TYPE, HeaderMap, Method};

use crate::config::DisraptorConfig;
use crate::identity::Caller;
use crate::proxy::outbound::{outbound_headers, OutboundMethod, OutboundRequest, TrustedCaller};
use crate::proxy::outcome::DispatchOutcome;
use crate::proxy::transport::UpstreamTransport;
use crate::routing::{expand_target, RouteTable, SegmentValues, TargetError};
use crate::store::GroupStore;

/// Per-request view of the hot-reloadable settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub app_secret_key: String,
    pub read_timeout: Duration,
}

impl From<&DisraptorConfig> for DispatchSettings {
    fn from(config: &DisraptorConfig) -> Self {
        Self {
            app_secret_key: config.app_secret_key.clone(),
            read_timeout: config.read_timeout(),
        }
    }
}

/// What the host hands over after it matched a request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Id of the route the host matched.
    pub route_id: String,
    pub method: Method,
    pub path: String,
    /// Values the host extracted, keyed by token (`:id`, `*rest`).
    pub values: SegmentValues,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct ProxyDispatcher {
    table: RouteTable,
    transport: Arc<dyn UpstreamTransport>,
    groups: Arc<GroupStore>,
}

impl ProxyDispatcher {
    pub fn new(table: RouteTable, transport: Arc<dyn UpstreamTransport>, groups: Arc<GroupStore>) -> Self {
        Self {
            table,
            transport,
            groups,
        }
    }

    pub async fn dispatch(
        &self,
        settings: &DispatchSettings,
        inbound: InboundRequest,
        caller: Option<&Caller>,
    ) -> DispatchOutcome {
        if settings.app_secret_key.is_empty() {
            tracing::warn!(path = %inbound.path, "App secret key is not set, refusing to proxy");
            return DispatchOutcome::Forbidden;
        }

        let InboundRequest {
            route_id,
            method,
            path,
            values,
            headers,
            body,
        } = inbound;

        let content_type = headers.get(CONTENT_TYPE);
        let Some(outbound_method) = OutboundMethod::from_inbound(&method, content_type, body) else {
            tracing::error!(method = %method, path = %path, "Request method is not proxyable");
            return DispatchOutcome::MethodRejected;
        };

        let request_method = outbound_method.request_method();
        let Some(route) = self.table.find_matched(&route_id, request_method, &path, &values) else {
            tracing::error!(route_id = %route_id, method = %method, path = %path, "No stored route for matched path");
            return DispatchOutcome::RouteMissing;
        };

        let url = match expand_target(&route.target_url, &values) {
            Ok(url) => url,
            Err(e @ TargetError::InvalidUrl(_)) => {
                tracing::error!(route_id = %route.id, error = %e, "Stored target url is invalid");
                return DispatchOutcome::RouteMissing;
            }
            Err(e) => {
                tracing::warn!(route_id = %route.id, path = %path, error = %e, "Refusing target outside the route");
                return DispatchOutcome::RouteMissing;
            }
        };

        let trusted = match caller {
            Some(caller) => Some(self.trust(caller).await),
            None => None,
        };
        let request = OutboundRequest {
            method: outbound_method,
            url: url.clone(),
            headers: outbound_headers(&headers, &settings.app_secret_key, trusted.as_ref()),
            timeout: settings.read_timeout,
        };

        tracing::info!(route_id = %route.id, method = %method, target = %url, "Dispatching");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(route_id = %route.id, target = %url, error = %e, "Upstream unreachable");
                return DispatchOutcome::UpstreamUnreachable;
            }
        };

        let outcome = DispatchOutcome::from_upstream(response);
        match &outcome {
            DispatchOutcome::Relayed(response) => {
                tracing::debug!(route_id = %route.id, status = %response.status, "Relaying upstream response");
            }
            DispatchOutcome::SeeOther(_) => {
                tracing::info!(route_id = %route.id, "Upstream requested a new location");
            }
            DispatchOutcome::UpstreamNotFound => {
                tracing::error!(route_id = %route.id, target = %url, "Upstream returned 404");
            }
            DispatchOutcome::Unhandled(status) => {
                tracing::warn!(route_id = %route.id, target = %url, status = %status, "Unhandled upstream status");
            }
            _ => {}
        }
        outcome
    }

    /// Trusted names come from the snapshot; a first sighting is recorded on
    /// a blocking thread since it writes to the backing store.
    async fn trust(&self, caller: &Caller) -> TrustedCaller {
        let translated = match self.groups.known_names(&caller.groups) {
            Some(names) => Ok(names),
            None => {
                let store = self.groups.clone();
                let seen = caller.groups.clone();
                match tokio::task::spawn_blocking(move || store.translate_groups(&seen)).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
        };

        let groups = match translated {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!(user = %caller.username, error = %e, "Could not resolve trusted group names");
                Vec::new()
            }
        };

        TrustedCaller {
            username: caller.username.clone(),
            groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};

    use crate::identity::CallerGroup;
    use crate::proxy::outbound::{X_DISRAPTOR_GROUPS, X_DISRAPTOR_USER};
    use crate::proxy::transport::{TransportError, UpstreamResponse};
    use crate::routing::{PathPattern, RequestMethod, Route};
    use crate::store::{MemoryStore, RouteStore};

    /// Answers every request with a fixed status and records what it saw.
    struct CountingTransport {
        calls: AtomicUsize,
        status: Option<StatusCode>,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl CountingTransport {
        fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status: Some(StatusCode::from_u16(status).unwrap()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last(&self) -> OutboundRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl UpstreamTransport for CountingTransport {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            let status = self.status.ok_or_else(|| TransportError::Connect("refused".into()))?;
            Ok(UpstreamResponse {
                status,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"hello"),
            })
        }
    }

    fn dispatcher(transport: Arc<CountingTransport>, routes: &[(&str, &str, &str, RequestMethod)]) -> ProxyDispatcher {
        let store = Arc::new(RouteStore::in_memory());
        for (id, path, target, method) in routes {
            store
                .put(id, Route::new(*id, &PathPattern::parse(path).unwrap(), *target, *method))
                .unwrap();
        }
        let groups = Arc::new(GroupStore::open(Arc::new(MemoryStore::new())).unwrap());
        ProxyDispatcher::new(RouteTable::new(store), transport, groups)
    }

    fn settings(secret: &str) -> DispatchSettings {
        DispatchSettings {
            app_secret_key: secret.into(),
            read_timeout: Duration::from_secs(5),
        }
    }

    fn inbound(route_id: &str, method: Method, path: &str, values: &[(&str, &str)]) -> InboundRequest {
        InboundRequest {
            route_id: route_id.into(),
            method,
            path: path.into(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    const TEST_ROUTE: (&str, &str, &str, RequestMethod) =
        ("1", "/test", "http://localhost:9000/test", RequestMethod::Get);

    #[tokio::test]
    async fn missing_secret_is_forbidden_without_network() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let outcome = dispatcher
            .dispatch(&settings(""), inbound("1", Method::GET, "/test", &[]), None)
            .await;

        assert!(matches!(outcome, DispatchOutcome::Forbidden));
        assert_eq!(outcome.status(), StatusCode::FORBIDDEN);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn success_reaches_upstream_once() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let outcome = dispatcher
            .dispatch(&settings("k"), inbound("1", Method::GET, "/test", &[]), None)
            .await;

        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.last().url.as_str(), "http://localhost:9000/test");
    }

    #[tokio::test]
    async fn wildcard_values_are_substituted() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(
            transport.clone(),
            &[("css", "/css/*wildcard", "http://upstream/css/*wildcard", RequestMethod::Get)],
        );

        dispatcher
            .dispatch(
                &settings("k"),
                inbound("css", Method::GET, "/css/app/theme.css", &[("*wildcard", "app/theme.css")]),
                None,
            )
            .await;

        assert_eq!(transport.last().url.as_str(), "http://upstream/css/app/theme.css");
    }

    #[tokio::test]
    async fn unknown_route_is_missing() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let outcome = dispatcher
            .dispatch(&settings("k"), inbound("1", Method::GET, "/other", &[]), None)
            .await;

        assert!(matches!(outcome, DispatchOutcome::RouteMissing));
        assert_eq!(outcome.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn method_must_match_stored_route() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let outcome = dispatcher
            .dispatch(&settings("k"), inbound("1", Method::POST, "/test", &[]), None)
            .await;
        assert!(matches!(outcome, DispatchOutcome::RouteMissing));

        let outcome = dispatcher
            .dispatch(&settings("k"), inbound("1", Method::PATCH, "/test", &[]), None)
            .await;
        assert!(matches!(outcome, DispatchOutcome::MethodRejected));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn connection_failure_is_unreachable() {
        let transport = CountingTransport::unreachable();
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let outcome = dispatcher
            .dispatch(&settings("k"), inbound("1", Method::GET, "/test", &[]), None)
            .await;

        assert!(matches!(outcome, DispatchOutcome::UpstreamUnreachable));
        assert_eq!(outcome.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn upstream_statuses_are_mapped() {
        for (upstream, expected) in [(404u16, 404u16), (500, 500), (303, 303), (201, 201)] {
            let transport = CountingTransport::answering(upstream);
            let dispatcher = dispatcher(transport, &[TEST_ROUTE]);

            let outcome = dispatcher
                .dispatch(&settings("k"), inbound("1", Method::GET, "/test", &[]), None)
                .await;
            assert_eq!(outcome.status().as_u16(), expected);
        }
    }

    #[tokio::test]
    async fn caller_identity_uses_trusted_group_names() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(transport.clone(), &[TEST_ROUTE]);

        let mut caller = Caller {
            username: "alice".into(),
            groups: vec![CallerGroup { id: 1, name: "staff".into() }],
        };
        dispatcher
            .dispatch(&settings("k"), inbound("1", Method::GET, "/test", &[]), Some(&caller))
            .await;

        caller.groups[0].name = "admins".into();
        let mut request = inbound("1", Method::GET, "/test", &[]);
        request
            .headers
            .insert(X_DISRAPTOR_USER, HeaderValue::from_static("mallory"));
        dispatcher.dispatch(&settings("k"), request, Some(&caller)).await;

        let sent = transport.last();
        assert_eq!(sent.headers.get(X_DISRAPTOR_USER).unwrap(), "alice");
        assert_eq!(sent.headers.get(X_DISRAPTOR_GROUPS).unwrap(), "staff");
    }

    #[tokio::test]
    async fn post_form_body_is_forwarded() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(
            transport.clone(),
            &[("f", "/form", "http://localhost:9000/form", RequestMethod::Post)],
        );

        let mut request = inbound("f", Method::POST, "/form", &[]);
        request.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        request.body = Bytes::from_static(b"a=1&b=two+words");
        dispatcher.dispatch(&settings("k"), request, None).await;

        let sent = transport.last();
        let payload = sent.method.payload().unwrap();
        assert_eq!(payload.encode(), Bytes::from_static(b"a=1&b=two+words"));
    }

    #[tokio::test]
    async fn duplicate_paths_forward_to_the_matched_route() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(
            transport.clone(),
            &[
                ("a", "/x", "http://a/x", RequestMethod::Get),
                ("b", "/x", "http://b/x", RequestMethod::Get),
                ("c", "/x", "http://c/x", RequestMethod::Get),
                ("d", "/x", "http://d/x", RequestMethod::Get),
            ],
        );

        for _ in 0..20 {
            dispatcher
                .dispatch(&settings("k"), inbound("a", Method::GET, "/x", &[]), None)
                .await;
            assert_eq!(transport.last().url.as_str(), "http://a/x");
        }
    }

    #[tokio::test]
    async fn traversal_in_wildcard_never_leaves_target() {
        let transport = CountingTransport::answering(200);
        let dispatcher = dispatcher(
            transport.clone(),
            &[("s", "/static/*w", "http://upstream/static/public/*w", RequestMethod::Get)],
        );

        for value in ["../../internal/secret", "%2e%2e/%2e%2e/internal"] {
            let path = format!("/static/{value}");
            let outcome = dispatcher
                .dispatch(&settings("k"), inbound("s", Method::GET, &path, &[("*w", value)]), None)
                .await;
            assert!(matches!(outcome, DispatchOutcome::RouteMissing));
        }
        assert_eq!(transport.calls(), 0);
    }
}

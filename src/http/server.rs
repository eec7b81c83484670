//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admin API and the proxy entry point
//! - Wire up middleware (request ID, tracing, timeout)
//! - Keep the live route registrations in sync with the route table
//! - Apply hot-reloaded configuration
//! - Serve until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{self, admin_patterns, RouteAdmin};
use crate::config::{watcher::apply_updates, ProxyConfig};
use crate::http::request::{request_span, UuidRequestId, X_REQUEST_ID};
use crate::identity::{CallerIdentity, SessionTable};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::{
    DispatchOutcome, DispatchSettings, HttpTransport, InboundRequest, ProxyDispatcher,
    UpstreamTransport,
};
use crate::routing::{LiveRoutes, RouteTable};
use crate::store::{GroupStore, JsonFileStore, KeyValueStore, MemoryStore, RouteStore, StoreError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<ProxyConfig>>,
    pub store: Arc<RouteStore>,
    pub admin: Arc<RouteAdmin>,
    pub live: Arc<LiveRoutes>,
    pub dispatcher: Arc<ProxyDispatcher>,
    pub identity: Arc<dyn CallerIdentity>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open route storage: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Build the server from configuration: file or memory storage, the
    /// `reqwest` transport and the configured session table.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let kv: Arc<dyn KeyValueStore> = match &config.storage.path {
            Some(path) => Arc::new(JsonFileStore::open(path)?),
            None => {
                tracing::warn!("No storage path configured, routes will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };
        let transport = Arc::new(HttpTransport::new(config.disraptor.connect_timeout())?);
        let identity = Arc::new(SessionTable::from_config(&config.identity));

        Self::with_parts(config, kv, transport, identity)
    }

    /// Build the server around explicit collaborators.
    pub fn with_parts(
        config: ProxyConfig,
        kv: Arc<dyn KeyValueStore>,
        transport: Arc<dyn UpstreamTransport>,
        identity: Arc<dyn CallerIdentity>,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(RouteStore::open(kv.clone())?);
        let groups = Arc::new(GroupStore::open(kv)?);

        let prefix = config.disraptor.reserved_prefix.clone();
        let live = Arc::new(LiveRoutes::new(admin_patterns(&prefix)));
        let admin = Arc::new(RouteAdmin::new(store.clone(), live.clone(), prefix));
        let dispatcher = Arc::new(ProxyDispatcher::new(
            RouteTable::new(store.clone()),
            transport,
            groups,
        ));

        tracing::info!(routes = store.len(), "Route table loaded");

        Ok(Self {
            state: AppState {
                config: Arc::new(ArcSwap::from_pointee(config)),
                store,
                admin,
                live,
                dispatcher,
                identity,
            },
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.load_full();
        let prefix = &config.disraptor.reserved_prefix;

        Router::new()
            .merge(admin::setup_admin_router(state.clone(), prefix))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// `config_updates` carries reloaded configurations from a
    /// [`ConfigWatcher`](crate::config::watcher::ConfigWatcher).
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: Option<mpsc::UnboundedReceiver<ProxyConfig>>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let state = self.state;

        let changes = state.admin.subscribe();
        let version = *changes.borrow();
        let routes: Vec<_> = state.store.get_all().values().cloned().collect();
        state.live.refresh(&routes, version);
        metrics::record_table_size(routes.len());

        let refresher = state
            .live
            .clone()
            .spawn_refresher(state.store.clone(), changes, shutdown.subscribe());

        if let Some(updates) = config_updates {
            tokio::spawn(apply_updates(state.config.clone(), updates, shutdown.subscribe()));
        }

        tracing::info!(address = %addr, "HTTP server starting");

        let app = Self::build_router(state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signaled())
            .await?;

        let _ = refresher.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy entry point for every path the admin API does not serve.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let outcome = proxy(&state, request).await;
    metrics::record_request(outcome.label(), outcome.status().as_u16(), start);
    outcome.into_response()
}

async fn proxy(state: &AppState, request: Request<Body>) -> DispatchOutcome {
    let config = state.config.load_full();
    if !config.disraptor.enabled {
        return DispatchOutcome::Disabled;
    }

    let path = request.uri().path().to_string();
    let Some(matched) = state.live.lookup(request.method(), &path) else {
        tracing::debug!(method = %request.method(), path = %path, "No live route");
        return DispatchOutcome::NoRoute;
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, config.disraptor.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(route_id = %matched.route_id, error = %e, "Could not buffer request body");
            return DispatchOutcome::BodyTooLarge;
        }
    };

    let caller = state.identity.current_caller(&parts.headers);
    let inbound = InboundRequest {
        route_id: matched.route_id,
        method: parts.method,
        path,
        values: matched.values,
        headers: parts.headers,
        body,
    };

    let settings = DispatchSettings::from(&config.disraptor);
    state
        .dispatcher
        .dispatch(&settings, inbound, caller.as_ref())
        .await
}

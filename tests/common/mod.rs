//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use disraptor::config::{schema::GroupConfig, ProxyConfig, SessionConfig};
use disraptor::http::AppState;
use disraptor::{HttpServer, Shutdown};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const APP_SECRET: &str = "test-app-secret";
pub const SESSION_TOKEN: &str = "alice-session";

/// Config with a secret, an admin key and one known session.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.disraptor.app_secret_key = APP_SECRET.into();
    config.disraptor.read_timeout_secs = 2;
    config.admin.api_key = ADMIN_KEY.into();
    config.identity.sessions.push(SessionConfig {
        token: SESSION_TOKEN.into(),
        username: "alice".into(),
        groups: vec![GroupConfig {
            id: 1,
            name: "staff".into(),
        }],
    });
    config
}

/// Serve `router` on an ephemeral port.
pub async fn start_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

pub struct Gateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

/// Start the full gateway on an ephemeral port.
pub async fn start_gateway(config: ProxyConfig) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let state = server.state().clone();
    let shutdown = Shutdown::new();

    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, None, run_shutdown).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();

    let gateway = Gateway {
        addr,
        state,
        shutdown,
        client,
        handle,
    };
    gateway.wait_for_routes().await;
    gateway
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until the live registrations caught up with the route table.
    pub async fn wait_for_routes(&self) {
        for _ in 0..200 {
            if self.state.live.version() >= self.state.admin.version() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("live routes never caught up with the route table");
    }

    pub async fn put_route(&self, id: &str, body: Value) -> reqwest::Response {
        let response = self
            .client
            .put(self.url(&format!("/admin/routes/{id}")))
            .bearer_auth(ADMIN_KEY)
            .json(&body)
            .send()
            .await
            .unwrap();
        self.wait_for_routes().await;
        response
    }

    pub async fn delete_route(&self, id: &str) -> reqwest::Response {
        let response = self
            .client
            .delete(self.url(&format!("/admin/routes/{id}")))
            .bearer_auth(ADMIN_KEY)
            .send()
            .await
            .unwrap();
        self.wait_for_routes().await;
        response
    }

    pub async fn admin_get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(ADMIN_KEY)
            .send()
            .await
            .unwrap()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub fn route_body(source_path: &str, target_url: &str, method: &str) -> Value {
    serde_json::json!({
        "sourcePath": source_path,
        "targetUrl": target_url,
        "requestMethod": method,
    })
}

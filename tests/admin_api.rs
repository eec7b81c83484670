//! RoutesAPI contract.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{route_body, start_gateway, test_config, ADMIN_KEY};

#[tokio::test]
async fn test_crud_contract() {
    let gateway = start_gateway(test_config()).await;

    let list: Value = gateway.admin_get("/admin/routes").await.json().await.unwrap();
    assert_eq!(list, json!({ "routes": [] }));

    let res = gateway
        .put_route("1", route_body("/users/./:id", "HTTP://LocalHost:9000/u/:id", "GET"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let created: Value = res.json().await.unwrap();
    assert_eq!(
        created,
        json!({
            "route": {
                "id": "1",
                "sourcePath": "/users/:id",
                "targetUrl": "http://localhost:9000/u/:id",
                "requestMethod": "get",
                "segments": [":id"],
            }
        })
    );

    let fetched: Value = gateway.admin_get("/admin/routes/1").await.json().await.unwrap();
    assert_eq!(fetched, created);

    let list: Value = gateway.admin_get("/admin/routes").await.json().await.unwrap();
    assert_eq!(list["routes"].as_array().unwrap().len(), 1);

    let res = gateway.delete_route("1").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "success": true }));

    let res = gateway.delete_route("1").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "success": true }));

    let res = gateway.admin_get("/admin/routes/1").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    gateway.stop().await;
}

#[tokio::test]
async fn test_update_replaces_route() {
    let gateway = start_gateway(test_config()).await;

    gateway
        .put_route("1", route_body("/old", "http://localhost:9000/old", "get"))
        .await;
    let res = gateway
        .put_route("1", route_body("/new", "http://localhost:9000/new", "post"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let list: Value = gateway.admin_get("/admin/routes").await.json().await.unwrap();
    let routes = list["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["sourcePath"], "/new");
    assert_eq!(routes[0]["requestMethod"], "post");

    gateway.stop().await;
}

#[tokio::test]
async fn test_invalid_input_is_rejected() {
    let gateway = start_gateway(test_config()).await;

    let cases = [
        route_body("/a/", "http://localhost:9000/a", "get"),
        route_body("/a", "http://localhost:9000/a", "patch"),
        route_body("/a", "not-a-url", "get"),
        route_body("/admin/sneaky", "http://localhost:9000/a", "get"),
        route_body("/a/*rest/b", "http://localhost:9000/a", "get"),
    ];

    for body in cases {
        let res = gateway.put_route("bad", body.clone()).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "accepted {body}");
        let error: Value = res.json().await.unwrap();
        assert!(error["error"].is_string());
    }

    let list: Value = gateway.admin_get("/admin/routes").await.json().await.unwrap();
    assert_eq!(list, json!({ "routes": [] }));

    let res = gateway
        .put_route("root", route_body("/", "http://localhost:9000/", "get"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    gateway.stop().await;
}

#[tokio::test]
async fn test_malformed_body_gets_error_payload() {
    let gateway = start_gateway(test_config()).await;

    let res = gateway
        .put_route("1", json!({ "sourcePath": "/a", "requestMethod": "get" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("targetUrl"));

    let res = gateway
        .client
        .put(gateway.url("/admin/routes/1"))
        .bearer_auth(ADMIN_KEY)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    let res = gateway
        .client
        .put(gateway.url("/admin/routes/1"))
        .bearer_auth(ADMIN_KEY)
        .body(r#"{"sourcePath":"/a","targetUrl":"http://up/a","requestMethod":"get"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    assert!(gateway.state.admin.list().is_empty());
    gateway.stop().await;
}

#[tokio::test]
async fn test_legacy_target_key_is_accepted() {
    let gateway = start_gateway(test_config()).await;

    let res = gateway
        .put_route(
            "legacy",
            json!({
                "sourcePath": "/legacy",
                "targetURL": "http://localhost:9000/legacy",
                "requestMethod": "get",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["route"]["targetUrl"], "http://localhost:9000/legacy");

    gateway.stop().await;
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let gateway = start_gateway(test_config()).await;

    let res = gateway
        .client
        .get(gateway.url("/admin/routes"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = gateway
        .client
        .put(gateway.url("/admin/routes/1"))
        .bearer_auth("wrong")
        .json(&route_body("/a", "http://localhost:9000/a", "get"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(gateway.state.admin.list().is_empty());

    let res = gateway
        .client
        .get(gateway.url("/admin/status"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.stop().await;
}

#[tokio::test]
async fn test_status_reports_table() {
    let gateway = start_gateway(test_config()).await;

    gateway
        .put_route("1", route_body("/a", "http://localhost:9000/a", "get"))
        .await;
    gateway
        .put_route("2", route_body("/b", "http://localhost:9000/b", "get"))
        .await;

    let status: Value = gateway.admin_get("/admin/status").await.json().await.unwrap();
    assert_eq!(status["enabled"], true);
    assert_eq!(status["routes"], 2);
    assert_eq!(status["tableVersion"], 2);
    assert_eq!(status["liveVersion"], 2);

    gateway.stop().await;
}

#[tokio::test]
async fn test_routes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.storage.path = Some(dir.path().join("store.json").to_string_lossy().into_owned());

    let gateway = start_gateway(config.clone()).await;
    gateway
        .put_route("1", route_body("/kept", "http://localhost:9000/kept", "get"))
        .await;
    gateway.stop().await;

    let gateway = start_gateway(config).await;
    let res = gateway.admin_get("/admin/routes/1").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["route"]["sourcePath"], "/kept");

    gateway.stop().await;
}

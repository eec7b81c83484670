use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::error::AdminError;
use crate::http::server::AppState;
use crate::routing::Route;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePayload {
    pub source_path: String,
    #[serde(alias = "targetURL")]
    pub target_url: String,
    pub request_method: String,
}

#[derive(Serialize)]
pub struct RouteList {
    pub routes: Vec<Route>,
}

#[derive(Serialize)]
pub struct RouteEnvelope {
    pub route: Route,
}

#[derive(Serialize)]
pub struct Success {
    pub success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub enabled: bool,
    pub table_version: u64,
    pub live_version: u64,
    pub routes: usize,
}

pub async fn list_routes(State(state): State<AppState>) -> Json<RouteList> {
    Json(RouteList {
        routes: state.admin.list(),
    })
}

pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RouteEnvelope>, AdminError> {
    let route = state.admin.get(&id)?;
    Ok(Json(RouteEnvelope { route }))
}

pub async fn put_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RoutePayload>, JsonRejection>,
) -> Result<Json<RouteEnvelope>, AdminError> {
    let Json(payload) = payload?;
    let admin = &state.admin;
    let RoutePayload {
        source_path,
        target_url,
        request_method,
    } = payload;

    let route = if admin.get(&id).is_ok() {
        admin.update(&id, &source_path, &target_url, &request_method)?
    } else {
        admin.create(&id, &source_path, &target_url, &request_method)?
    };

    Ok(Json(RouteEnvelope { route }))
}

pub async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Success>, AdminError> {
    state.admin.delete(&id)?;
    Ok(Json(Success { success: true }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let config = state.config.load();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        enabled: config.disraptor.enabled,
        table_version: state.admin.version(),
        live_version: state.live.version(),
        routes: state.admin.list().len(),
    })
}

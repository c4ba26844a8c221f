//! 托管设备代理接口
//!
//! - GET /api/managed-devices
//! - GET /api/managed-devices/{id}/status
//! - POST /api/managed-devices/{id}/play-url
//!
//! 托管设备不进入设备注册表，也不出现在在线快照里。

use crate::AppState;
use crate::utils::request_base_url;
use crate::utils::response::{bad_request_error, not_found_error, ok, upstream_error};
use api_contract::{ManagedDeviceDto, ManagedProbeDto, PlayUrlRequest, PlayUrlResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use signage_assets::{ProxyError, asset_locator};
use tracing::warn;

pub async fn list_managed_devices(State(state): State<AppState>) -> Response {
    let items: Vec<ManagedDeviceDto> = state
        .managed
        .list()
        .into_iter()
        .map(|device| ManagedDeviceDto {
            id: device.id,
            name: device.name,
            base_url: device.base_url,
        })
        .collect();
    ok(items)
}

pub async fn get_managed_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Response {
    match state.managed.probe(&device_id).await {
        Ok(probe) => ok(ManagedProbeDto {
            online: probe.online,
            status: probe.status,
        }),
        Err(err) => proxy_error(&device_id, err),
    }
}

/// 推送播放地址；不以 http 开头的值视为本服务的素材 ID。
pub async fn post_play_url(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PlayUrlRequest>,
) -> Response {
    let Some(url) = req
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
    else {
        return bad_request_error("url is required");
    };
    let locator = if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else {
        let request_base = request_base_url(&headers, &state.fallback_base_url);
        asset_locator(state.hub.locator_base(&request_base), &url)
    };
    match state.managed.push_locator(&device_id, &locator).await {
        Ok(outcome) => ok(PlayUrlResponse {
            url: locator,
            remote_asset_id: outcome.remote_asset_id,
            activated: outcome.activated,
        }),
        Err(err) => proxy_error(&device_id, err),
    }
}

fn proxy_error(device_id: &str, err: ProxyError) -> Response {
    match err {
        ProxyError::UnknownDevice(_) => {
            not_found_error(format!("managed device {} not found", device_id))
        }
        other => {
            warn!(
                target: "signage.api",
                managed_device_id = %device_id,
                error = %other,
                "managed_device_request_failed"
            );
            upstream_error(other.to_string())
        }
    }
}
